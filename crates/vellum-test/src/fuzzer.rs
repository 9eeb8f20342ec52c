//! Scene fuzzer - seeded random mutations for property testing
//!
//! Generates scenes and committed mutations from a seeded RNG so failures
//! reproduce. Nonces come from the same RNG rather than the global one:
//! determinism matters more than entropy here.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vellum_core::{Element, ElementId, ElementMap, GroupId, OrderKey, ShapeKind};

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Elements in the seeded scene
    pub element_count: usize,
    /// Mutations to generate per run
    pub op_count: usize,
    /// Probability a mutation creates a new element
    pub create_prob: f64,
    /// Probability a mutation soft-deletes its target
    pub delete_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            element_count: 20,
            op_count: 200,
            create_prob: 0.1,
            delete_prob: 0.15,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            element_count: 5,
            op_count: 40,
            ..FuzzerConfig::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            element_count: 100,
            op_count: 2000,
            ..FuzzerConfig::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Seeded scene and mutation generator
pub struct SceneFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    next_id: u64,
    clock: u64,
}

const PALETTE: &[&str] = &["#1e1e1e", "#e03131", "#2f9e44", "#1971c2", "#f08c00"];

impl SceneFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        SceneFuzzer {
            config,
            rng,
            next_id: 1,
            clock: 0,
        }
    }

    pub fn config(&self) -> &FuzzerConfig {
        &self.config
    }

    /// Start fresh ids at `base`; concurrent replicas use disjoint ranges
    pub fn with_id_base(mut self, base: u64) -> Self {
        self.next_id = base;
        self
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// A fresh element with randomized content
    pub fn random_element(&mut self) -> Element {
        let id = ElementId::new(self.next_id);
        self.next_id += 1;

        let shape = match self.rng.gen_range(0..4) {
            0 => ShapeKind::Rectangle,
            1 => ShapeKind::Ellipse,
            2 => ShapeKind::Diamond,
            _ => ShapeKind::Text,
        };
        let index = OrderKey::new(format!("a{:06}", self.rng.gen_range(0..1_000_000)));

        Element::new(id, shape)
            .with_index(index)
            .with_position(self.rng.gen_range(-500.0..500.0), self.rng.gen_range(-500.0..500.0))
            .with_size(self.rng.gen_range(1.0..300.0), self.rng.gen_range(1.0..300.0))
            .with_stroke_color(PALETTE[self.rng.gen_range(0..PALETTE.len())])
            .with_version_nonce(self.rng.gen())
    }

    /// Build a scene of `element_count` random elements
    pub fn seed_scene(&mut self) -> ElementMap {
        let mut scene = ElementMap::new();
        for _ in 0..self.config.element_count {
            let element = self.random_element();
            scene.insert(element.id, Arc::new(element));
        }
        scene
    }

    /// Apply one random committed mutation, returning the next scene
    pub fn mutate(&mut self, scene: &ElementMap) -> ElementMap {
        let mut next = scene.clone();

        if scene.is_empty() || self.rng.gen_bool(self.config.create_prob) {
            let element = self.random_element();
            next.insert(element.id, Arc::new(element));
            return next;
        }

        let ids: Vec<ElementId> = scene.keys().copied().collect();
        let id = ids[self.rng.gen_range(0..ids.len())];
        let target = scene[&id].as_ref().clone();
        let now = self.tick();
        let nonce: u64 = self.rng.gen();

        let mutated = if self.rng.gen_bool(self.config.delete_prob) {
            if target.is_deleted {
                let mut undeleted = target;
                undeleted.is_deleted = false;
                undeleted
            } else {
                target.deleted()
            }
        } else {
            match self.rng.gen_range(0..5) {
                0 => target.with_position(
                    self.rng.gen_range(-500.0..500.0),
                    self.rng.gen_range(-500.0..500.0),
                ),
                1 => target.with_size(
                    self.rng.gen_range(1.0..300.0),
                    self.rng.gen_range(1.0..300.0),
                ),
                2 => target.with_stroke_color(PALETTE[self.rng.gen_range(0..PALETTE.len())]),
                3 => target.with_index(OrderKey::new(format!(
                    "a{:06}",
                    self.rng.gen_range(0..1_000_000)
                ))),
                _ => target.with_group_ids(vec![GroupId::new(self.rng.gen_range(1..5))]),
            }
        };

        next.insert(id, Arc::new(mutated.committed(now).with_version_nonce(nonce)));
        next
    }

    /// Run `op_count` mutations from a starting scene, returning every
    /// intermediate scene including start and end
    pub fn mutation_chain(&mut self, start: ElementMap) -> Vec<ElementMap> {
        let mut scenes = vec![start];
        for _ in 0..self.config.op_count {
            let next = self.mutate(scenes.last().expect("chain is never empty"));
            scenes.push(next);
        }
        scenes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzer_is_deterministic() {
        let mut a = SceneFuzzer::new(FuzzerConfig::light());
        let mut b = SceneFuzzer::new(FuzzerConfig::light());

        let scene_a = a.seed_scene();
        let scene_b = b.seed_scene();
        assert_eq!(scene_a.len(), scene_b.len());
        for (id, element) in &scene_a {
            assert_eq!(element.as_ref(), scene_b[id].as_ref());
        }
    }

    #[test]
    fn test_mutations_commit() {
        let mut fuzzer = SceneFuzzer::new(FuzzerConfig::light());
        let scene = fuzzer.seed_scene();
        let next = fuzzer.mutate(&scene);

        // Exactly one element changed, and it carries a fresh nonce
        let changed: Vec<_> = next
            .iter()
            .filter(|(id, element)| {
                scene
                    .get(id)
                    .map(|prev| prev.version_nonce != element.version_nonce)
                    .unwrap_or(true)
            })
            .collect();
        assert_eq!(changed.len(), 1);
    }
}

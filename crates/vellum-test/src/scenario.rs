//! Replica simulator
//!
//! A [`Replica`] is a simulated editor: a live working map, the
//! last-known-good snapshot, an observed app state and an undo/redo
//! history of delta pairs. It plays the role of the surrounding
//! application so tests can exercise commit, undo/redo replay and
//! remote reconciliation end to end.

use std::sync::Arc;

use vellum_core::{
    sequence_to_map, Element, ElementMap, ErrorPolicy, ObservedAppState, ReplicaId, Sequence,
};
use vellum_delta::{AppStateDelta, ChangeSet, DeltaSide, ElementsDelta};
use vellum_reconcile::{reconcile, ReconcileStats, RemoteElement};

/// One undo/redo unit: the element and app-state deltas of a commit
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub elements: ElementsDelta,
    pub app_state: AppStateDelta,
}

/// A simulated editor replica
pub struct Replica {
    pub id: ReplicaId,
    pub elements: ElementMap,
    /// Last-known-good fallback for elements missing from the working set
    pub snapshot: ElementMap,
    pub observed: ObservedAppState,
    policy: ErrorPolicy,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
}

impl Replica {
    pub fn new(id: ReplicaId) -> Self {
        Replica {
            id,
            elements: ElementMap::new(),
            snapshot: ElementMap::new(),
            observed: ObservedAppState::new(),
            policy: ErrorPolicy::strict(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Seed the scene without recording history
    pub fn seed(&mut self, elements: ElementMap) {
        self.snapshot = elements.clone();
        self.elements = elements;
    }

    /// Commit a prepared next state, capturing one history entry
    pub fn commit(&mut self, next_elements: ElementMap, next_observed: ObservedAppState) {
        let elements_delta = ElementsDelta::calculate(&self.elements, &next_elements);
        let app_state_delta = AppStateDelta::calculate(&self.observed, &next_observed);

        if !elements_delta.is_empty() || !app_state_delta.is_empty() {
            self.undo_stack.push(HistoryEntry {
                elements: elements_delta,
                app_state: app_state_delta,
            });
            self.redo_stack.clear();
        }

        self.snapshot = next_elements.clone();
        self.elements = next_elements;
        self.observed = next_observed;
    }

    /// Commit a single element mutation
    pub fn commit_element(&mut self, element: Element) {
        let mut next = self.elements.clone();
        next.insert(element.id, Arc::new(element));
        self.commit(next, self.observed.clone());
    }

    /// Pop one history entry and replay its inverse. Returns whether the
    /// replay produced a visible change.
    pub fn undo(&mut self) -> Option<bool> {
        let entry = self.undo_stack.pop()?;
        let inversed = HistoryEntry {
            elements: entry.elements.inverse(),
            app_state: entry.app_state.inverse(),
        };
        let visible = self.replay(&inversed);
        self.redo_stack.push(entry);
        Some(visible)
    }

    /// Replay the most recently undone entry forward
    pub fn redo(&mut self) -> Option<bool> {
        let entry = self.redo_stack.pop()?;
        let visible = self.replay(&entry);
        self.undo_stack.push(entry);
        Some(visible)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn replay(&mut self, entry: &HistoryEntry) -> bool {
        // Re-ground what the delta claims to be replacing, so redo after
        // drift restores what was actually on screen
        let regrounded = entry
            .elements
            .applied_latest_changes(&self.elements, DeltaSide::Deleted);

        let (next_elements, flags) = regrounded
            .apply_to(&self.elements, &self.snapshot, self.policy)
            .expect("elements replay failed");
        let (next_observed, observed_visible) = entry
            .app_state
            .apply_to(&self.observed, &next_elements, self.policy)
            .expect("app-state replay failed");

        self.snapshot = next_elements.clone();
        self.elements = next_elements;
        self.observed = next_observed;

        flags.contains_visible_difference || observed_visible
    }

    /// The scene as an ordered sequence (id order; deterministic across
    /// replicas)
    pub fn sequence(&self) -> Sequence {
        self.elements.values().cloned().collect()
    }

    /// Package the scene as an un-hinted remote batch
    pub fn broadcast(&self) -> Vec<RemoteElement> {
        self.sequence().into_iter().map(RemoteElement::new).collect()
    }

    /// Merge a remote batch into the working set
    pub fn receive(&mut self, batch: &[RemoteElement]) -> ReconcileStats {
        let local = self.sequence();
        let result = reconcile(&local, batch);
        self.elements = sequence_to_map(&result.elements);
        self.snapshot = self.elements.clone();
        result.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::{ElementId, ShapeKind};

    #[test]
    fn test_commit_then_undo_restores_scene() {
        let mut replica = Replica::new(ReplicaId::new(1));
        let element = Element::new(ElementId::new(1), ShapeKind::Rectangle);
        replica.commit_element(element);

        assert_eq!(replica.elements.len(), 1);
        assert!(replica.undo().unwrap());
        // Undo of an addition soft-deletes
        assert!(replica.elements[&ElementId::new(1)].is_deleted);
        assert!(replica.redo().unwrap());
        assert!(!replica.elements[&ElementId::new(1)].is_deleted);
    }

    #[test]
    fn test_empty_commit_records_no_history() {
        let mut replica = Replica::new(ReplicaId::new(1));
        replica.commit(ElementMap::new(), ObservedAppState::new());
        assert!(!replica.can_undo());
    }
}

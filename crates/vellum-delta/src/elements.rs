//! Per-element change-set over a scene
//!
//! An [`ElementsDelta`] records one committed mutation batch as three
//! id-indexed delta maps: `added`, `removed`, `updated`. Every id appears
//! in exactly one map, and the map is determined by the delta's soft-delete
//! transition: added goes deleted→alive, removed goes alive→deleted,
//! updated agrees on both sides.
//!
//! Synthesized added/removed deltas keep one side as a bare tombstone so
//! that replaying them can never overwrite fields a concurrent peer
//! changed; only the calculated update deltas are side-symmetric.

use std::collections::BTreeMap;
use std::sync::Arc;

use vellum_core::{
    Element, ElementId, ElementMap, ErrorPolicy, ShapeKind, VellumError, VellumResult,
};

use crate::delta::{ChangeSet, Delta, Diffable, Patch};
use crate::patch::{ElementField, ElementPatch};

/// A single element's structural diff
pub type ElementDelta = Delta<ElementPatch>;

/// Which side of a delta an operation targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaSide {
    Deleted,
    Inserted,
}

/// The classification maps of an [`ElementsDelta`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeltaKind {
    Added,
    Removed,
    Updated,
}

/// Flags computed while applying an [`ElementsDelta`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyFlags {
    /// Creation, deletion, or a property change on a currently-visible
    /// element; ordering-only changes excluded
    pub contains_visible_difference: bool,
    /// An ordering difference: an index change, or an element restored
    /// from the snapshot at an unknown position
    pub contains_zindex_difference: bool,
}

/// Change-set of one committed mutation batch over the element working set
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementsDelta {
    added: BTreeMap<ElementId, ElementDelta>,
    removed: BTreeMap<ElementId, ElementDelta>,
    updated: BTreeMap<ElementId, ElementDelta>,
}

impl ElementsDelta {
    pub fn empty() -> Self {
        ElementsDelta::default()
    }

    /// Assemble a change-set from already-classified delta maps,
    /// validating the classification invariant under `policy`.
    ///
    /// This is the only door: `calculate` and wire `restore` both come
    /// through here.
    pub fn create(
        added: BTreeMap<ElementId, ElementDelta>,
        removed: BTreeMap<ElementId, ElementDelta>,
        updated: BTreeMap<ElementId, ElementDelta>,
        policy: ErrorPolicy,
    ) -> VellumResult<Self> {
        let delta = ElementsDelta {
            added,
            removed,
            updated,
        };
        if policy.strict_invariants {
            delta.validate()?;
        }
        Ok(delta)
    }

    /// Three-way scan of two element working sets.
    ///
    /// Ids only in `prev` become synthesized removals (full prior state →
    /// tombstone), ids only in `next` synthesized additions (tombstone →
    /// full new state). Ids in both are diffed when their `version_nonce`
    /// changed; metadata (id, version, version nonce, updated stamp) never
    /// enters the diff, the bound-elements relation is refined to its
    /// keyed difference, and empty diffs are dropped.
    pub fn calculate(prev: &ElementMap, next: &ElementMap) -> Self {
        let mut added = BTreeMap::new();
        let mut removed = BTreeMap::new();
        let mut updated = BTreeMap::new();

        for (id, prev_element) in prev {
            if next.contains_key(id) {
                continue;
            }
            // Hard-removed from the working set. An element that was
            // already soft-deleted was never observable; no delta.
            if prev_element.is_deleted {
                continue;
            }
            removed.insert(
                *id,
                Delta::new(prev_element.capture(), ElementPatch::tombstone()),
            );
        }

        for (id, next_element) in next {
            let Some(prev_element) = prev.get(id) else {
                if next_element.is_deleted {
                    continue;
                }
                added.insert(
                    *id,
                    Delta::new(ElementPatch::tombstone(), next_element.capture()),
                );
                continue;
            };

            if Arc::ptr_eq(prev_element, next_element) {
                continue;
            }
            // Same nonce means no committed edit in between; referential
            // inequality alone is not a change signal.
            if prev_element.version_nonce == next_element.version_nonce {
                continue;
            }

            let delta = Delta::calculate(prev_element.as_ref(), next_element.as_ref());
            if delta.is_empty() {
                continue;
            }

            match (prev_element.is_deleted, next_element.is_deleted) {
                (true, false) => added.insert(*id, delta),
                (false, true) => removed.insert(*id, delta),
                _ => updated.insert(*id, delta),
            };
        }

        ElementsDelta {
            added,
            removed,
            updated,
        }
    }

    pub fn added(&self) -> &BTreeMap<ElementId, ElementDelta> {
        &self.added
    }

    pub fn removed(&self) -> &BTreeMap<ElementId, ElementDelta> {
        &self.removed
    }

    pub fn updated(&self) -> &BTreeMap<ElementId, ElementDelta> {
        &self.updated
    }

    /// Ids touched by this change-set, across all three maps
    pub fn ids(&self) -> impl Iterator<Item = &ElementId> {
        self.added
            .keys()
            .chain(self.removed.keys())
            .chain(self.updated.keys())
    }

    /// Check the classification invariant: every id appears in exactly
    /// one map, and every delta sits in the map matching its soft-delete
    /// transition
    pub fn validate(&self) -> VellumResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for id in self.ids() {
            if !seen.insert(*id) {
                return Err(VellumError::DataIntegrity(format!(
                    "element {id} appears in more than one delta map"
                )));
            }
        }
        for (id, delta) in &self.added {
            if classify(delta) != DeltaKind::Added {
                return Err(misclassified(*id, "added", delta));
            }
        }
        for (id, delta) in &self.removed {
            if classify(delta) != DeltaKind::Removed {
                return Err(misclassified(*id, "removed", delta));
            }
        }
        for (id, delta) in &self.updated {
            if classify(delta) != DeltaKind::Updated {
                return Err(misclassified(*id, "updated", delta));
            }
        }
        Ok(())
    }

    /// Re-ground one side of every delta to the corresponding live
    /// element's current fields, then reclassify.
    ///
    /// The bound-elements relation stays as the already-diffed difference;
    /// grounding it to the full live list would turn a relation patch into
    /// a wholesale replacement. Reclassification redistributes deltas whose
    /// soft-delete transition changed out from under them while history
    /// was waiting to replay.
    pub fn applied_latest_changes(&self, elements: &ElementMap, side: DeltaSide) -> Self {
        let mut added = BTreeMap::new();
        let mut removed = BTreeMap::new();
        let mut updated = BTreeMap::new();

        let maps = [&self.added, &self.removed, &self.updated];
        for map in maps {
            for (id, delta) in map {
                let regrounded = match elements.get(id) {
                    Some(element) => reground(delta, element, side),
                    None => delta.clone(),
                };
                match classify(&regrounded) {
                    DeltaKind::Added => added.insert(*id, regrounded),
                    DeltaKind::Removed => removed.insert(*id, regrounded),
                    DeltaKind::Updated => updated.insert(*id, regrounded),
                };
            }
        }

        ElementsDelta {
            added,
            removed,
            updated,
        }
    }

    /// Apply this change-set to the live working set.
    ///
    /// Transactional: a fresh map is built and the input is never touched.
    /// On failure the caller gets either the error (`propagate_apply_errors`)
    /// or the original map with the visible flag raised — under-reporting
    /// here risks a silently skipped history step, so the degraded path
    /// over-reports.
    pub fn apply_to(
        &self,
        elements: &ElementMap,
        snapshot: &ElementMap,
        policy: ErrorPolicy,
    ) -> VellumResult<(ElementMap, ApplyFlags)> {
        match self.try_apply(elements, snapshot) {
            Ok(applied) => Ok(applied),
            Err(err) => {
                tracing::warn!("elements delta apply failed, keeping original scene: {}", err);
                if policy.propagate_apply_errors {
                    Err(err)
                } else {
                    let flags = ApplyFlags {
                        contains_visible_difference: true,
                        contains_zindex_difference: false,
                    };
                    Ok((elements.clone(), flags))
                }
            }
        }
    }

    fn try_apply(
        &self,
        elements: &ElementMap,
        snapshot: &ElementMap,
    ) -> VellumResult<(ElementMap, ApplyFlags)> {
        let mut next = elements.clone();
        let mut flags = ApplyFlags::default();

        let phases = [
            (DeltaKind::Added, &self.added),
            (DeltaKind::Removed, &self.removed),
            (DeltaKind::Updated, &self.updated),
        ];
        for (kind, map) in phases {
            for (id, delta) in map {
                let mut from_snapshot = false;
                let target: Arc<Element> = match next.get(id) {
                    Some(element) => element.clone(),
                    None => match snapshot.get(id) {
                        Some(element) => {
                            // Present in the last-known-good snapshot but
                            // not in the working set: restoring it loses
                            // its position relative to the live order.
                            from_snapshot = true;
                            flags.contains_zindex_difference = true;
                            element.clone()
                        }
                        None if kind == DeltaKind::Added => {
                            Arc::new(synthesize(*id, &delta.inserted))
                        }
                        None => return Err(VellumError::ElementNotFound(*id)),
                    },
                };

                let was_visible = !from_snapshot
                    && elements.get(id).map(|e| e.is_visible()).unwrap_or(false);
                let applied = Arc::new(
                    target
                        .apply(&delta.deleted, &delta.inserted)
                        .committed(target.updated),
                );
                let now_visible = applied.is_visible();

                if was_visible != now_visible {
                    flags.contains_visible_difference = true;
                } else if now_visible && touches_beyond_ordering(delta) {
                    flags.contains_visible_difference = true;
                }
                if touches_field(delta, ElementField::Index) {
                    flags.contains_zindex_difference = true;
                }

                next.insert(*id, applied);
            }
        }

        Ok((next, flags))
    }
}

impl ChangeSet for ElementsDelta {
    /// Swaps the sides of every delta and the added/removed maps; the
    /// updated map keeps its slot since its transition is symmetric
    fn inverse(&self) -> Self {
        let invert = |map: &BTreeMap<ElementId, ElementDelta>| {
            map.iter().map(|(id, delta)| (*id, delta.inverse())).collect()
        };

        ElementsDelta {
            added: invert(&self.removed),
            removed: invert(&self.added),
            updated: invert(&self.updated),
        }
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Soft-delete transition of a delta, which decides its map
fn classify(delta: &ElementDelta) -> DeltaKind {
    let deleted = delta.deleted.is_deleted;
    let inserted = delta.inserted.is_deleted;

    if deleted == Some(true) && inserted != Some(true) {
        DeltaKind::Added
    } else if deleted != Some(true) && inserted == Some(true) {
        DeltaKind::Removed
    } else {
        DeltaKind::Updated
    }
}

fn misclassified(id: ElementId, map: &'static str, delta: &ElementDelta) -> VellumError {
    VellumError::Misclassified {
        id,
        map,
        transition: format!(
            "{:?} -> {:?}",
            delta.deleted.is_deleted, delta.inserted.is_deleted
        ),
    }
}

/// Replace the chosen side's recorded values with the element's current
/// ones, field by field; the bound-elements relation is left as diffed
fn reground(delta: &ElementDelta, element: &Element, side: DeltaSide) -> ElementDelta {
    let latest = element.capture();
    let mut regrounded = delta.clone();
    let patch = match side {
        DeltaSide::Deleted => &mut regrounded.deleted,
        DeltaSide::Inserted => &mut regrounded.inserted,
    };
    for field in patch.fields() {
        if field == ElementField::BoundElements {
            continue;
        }
        patch.adopt(&latest, field);
    }
    regrounded
}

/// Build a brand-new element from the inserted side of an added delta
fn synthesize(id: ElementId, inserted: &ElementPatch) -> Element {
    let shape = inserted.shape.unwrap_or(ShapeKind::Rectangle);
    Element::new(id, shape).apply(&ElementPatch::default(), inserted)
}

/// Does the delta change anything besides ordering and the soft-delete
/// flag? Deletion transitions are accounted for separately.
fn touches_beyond_ordering(delta: &ElementDelta) -> bool {
    delta
        .deleted
        .fields()
        .into_iter()
        .chain(delta.inserted.fields())
        .any(|field| field != ElementField::Index && field != ElementField::IsDeleted)
}

fn touches_field(delta: &ElementDelta, field: ElementField) -> bool {
    delta.deleted.contains(field) || delta.inserted.contains(field)
}

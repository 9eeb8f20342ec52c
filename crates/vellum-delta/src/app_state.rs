//! Change-set over the observed app-state projection
//!
//! Unlike elements, observed state is a single record, so the change-set
//! is one [`Delta`]. The interesting part is replay: selection and editing
//! fields reference element ids that may have been deleted by a concurrent
//! peer, so `apply_to` filters every reference against the elements the
//! scene will actually contain.

use std::collections::BTreeSet;

use vellum_core::{
    ElementId, ElementMap, ErrorPolicy, GroupId, ObservedAppState, VellumError, VellumResult,
};

use crate::delta::{ChangeSet, Delta, Diffable, Patch};
use crate::patch::{ObservedField, ObservedPatch};

/// A single observed-state structural diff
pub type ObservedDelta = Delta<ObservedPatch>;

/// Change-set of one committed mutation batch over the observed UI state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppStateDelta {
    delta: ObservedDelta,
}

impl AppStateDelta {
    pub fn empty() -> Self {
        AppStateDelta::default()
    }

    /// Wrap an already-computed delta, validating that both sides record
    /// the same field set. Wire `restore` comes through here.
    pub fn create(delta: ObservedDelta, policy: ErrorPolicy) -> VellumResult<Self> {
        if policy.strict_invariants {
            validate_sides(&delta)?;
        }
        Ok(AppStateDelta { delta })
    }

    /// Diff two observed projections. Selection sets become presence-only
    /// fine-grained diffs.
    pub fn calculate(prev: &ObservedAppState, next: &ObservedAppState) -> Self {
        AppStateDelta {
            delta: Delta::calculate(prev, next),
        }
    }

    pub fn delta(&self) -> &ObservedDelta {
        &self.delta
    }

    /// Apply this change-set against `state`, filtering element references
    /// through `next_elements` — the elements the scene will contain after
    /// the paired elements delta has been applied.
    ///
    /// Failure handling is the opposite of the elements side: stale app
    /// state is low stakes, so outside strict mode failures are logged and
    /// swallowed, returning the input with no visible change rather than
    /// resurrecting dangling references.
    pub fn apply_to(
        &self,
        state: &ObservedAppState,
        next_elements: &ElementMap,
        policy: ErrorPolicy,
    ) -> VellumResult<(ObservedAppState, bool)> {
        match self.try_apply(state, next_elements) {
            Ok(applied) => Ok(applied),
            Err(err) => {
                tracing::warn!("app-state delta apply failed, keeping original state: {}", err);
                if policy.propagate_apply_errors {
                    Err(err)
                } else {
                    Ok((state.clone(), false))
                }
            }
        }
    }

    fn try_apply(
        &self,
        state: &ObservedAppState,
        next_elements: &ElementMap,
    ) -> VellumResult<(ObservedAppState, bool)> {
        validate_sides(&self.delta)?;

        let mut next = state.apply(&self.delta.deleted, &self.delta.inserted);
        let mut visible = false;

        for field in self.delta.inserted.fields() {
            match field {
                ObservedField::Name => {
                    visible |= next.name != state.name;
                }
                ObservedField::ViewBackgroundColor => {
                    visible |= next.view_background_color != state.view_background_color;
                }
                ObservedField::SelectedElementIds => {
                    next.selected_element_ids =
                        filter_elements(&next.selected_element_ids, next_elements);
                    visible |= next.selected_element_ids != state.selected_element_ids;
                }
                ObservedField::SelectedGroupIds => {
                    next.selected_group_ids =
                        filter_groups(&next.selected_group_ids, next_elements);
                    visible |= next.selected_group_ids != state.selected_group_ids;
                }
                ObservedField::EditingGroupId => {
                    if let Some(group_id) = next.editing_group_id {
                        if group_is_empty(group_id, next_elements) {
                            next.editing_group_id = None;
                        }
                    }
                    visible |= next.editing_group_id != state.editing_group_id;
                }
                ObservedField::SelectedLinearElementId => {
                    next.selected_linear_element_id =
                        filter_element(next.selected_linear_element_id, next_elements);
                    visible |= next.selected_linear_element_id != state.selected_linear_element_id;
                }
                ObservedField::EditingLinearElementId => {
                    next.editing_linear_element_id =
                        filter_element(next.editing_linear_element_id, next_elements);
                    visible |= next.editing_linear_element_id != state.editing_linear_element_id;
                }
                ObservedField::CroppingElementId => {
                    next.cropping_element_id =
                        filter_element(next.cropping_element_id, next_elements);
                    visible |= next.cropping_element_id != state.cropping_element_id;
                }
            }
        }

        Ok((next, visible))
    }
}

impl ChangeSet for AppStateDelta {
    fn inverse(&self) -> Self {
        AppStateDelta {
            delta: self.delta.inverse(),
        }
    }

    fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }
}

/// Both sides of an observed delta must record the same field set; a
/// mismatch means a corrupt payload
fn validate_sides(delta: &ObservedDelta) -> VellumResult<()> {
    let deleted = delta.deleted.fields();
    let inserted = delta.inserted.fields();
    if deleted != inserted {
        return Err(VellumError::MismatchedSides {
            deleted: deleted.len(),
            inserted: inserted.len(),
        });
    }
    Ok(())
}

fn element_is_live(id: ElementId, elements: &ElementMap) -> bool {
    elements.get(&id).map(|e| e.is_visible()).unwrap_or(false)
}

/// A group is emptied when no live element carries it anymore
fn group_is_empty(group_id: GroupId, elements: &ElementMap) -> bool {
    !elements
        .values()
        .any(|element| element.is_visible() && element.group_ids.contains(&group_id))
}

fn filter_elements(ids: &BTreeSet<ElementId>, elements: &ElementMap) -> BTreeSet<ElementId> {
    ids.iter()
        .copied()
        .filter(|&id| element_is_live(id, elements))
        .collect()
}

fn filter_groups(ids: &BTreeSet<GroupId>, elements: &ElementMap) -> BTreeSet<GroupId> {
    ids.iter()
        .copied()
        .filter(|&group_id| !group_is_empty(group_id, elements))
        .collect()
}

fn filter_element(id: Option<ElementId>, elements: &ElementMap) -> Option<ElementId> {
    id.filter(|&id| element_is_live(id, elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vellum_core::{Element, ShapeKind};

    fn live_map(elements: impl IntoIterator<Item = Element>) -> ElementMap {
        elements
            .into_iter()
            .map(|element| (element.id, Arc::new(element)))
            .collect()
    }

    fn rect(id: u64) -> Element {
        Element::new(ElementId::new(id), ShapeKind::Rectangle)
    }

    #[test]
    fn test_selection_of_deleted_element_is_not_visible() {
        let prev = ObservedAppState::new();
        let next = ObservedAppState::new().with_selected_elements([ElementId::new(1)]);
        let delta = AppStateDelta::calculate(&prev, &next);

        let elements = live_map([rect(1).deleted()]);
        let (applied, visible) = delta
            .apply_to(&prev, &elements, ErrorPolicy::strict())
            .unwrap();

        assert!(applied.selected_element_ids.is_empty());
        assert!(!visible);
    }

    #[test]
    fn test_selection_of_live_element_is_visible() {
        let prev = ObservedAppState::new();
        let next = ObservedAppState::new().with_selected_elements([ElementId::new(1)]);
        let delta = AppStateDelta::calculate(&prev, &next);

        let elements = live_map([rect(1)]);
        let (applied, visible) = delta
            .apply_to(&prev, &elements, ErrorPolicy::strict())
            .unwrap();

        assert_eq!(applied.selected_element_ids, [ElementId::new(1)].into());
        assert!(visible);
    }

    #[test]
    fn test_full_deselection_is_visible() {
        let prev = ObservedAppState::new().with_selected_elements([ElementId::new(1)]);
        let next = ObservedAppState::new();
        let delta = AppStateDelta::calculate(&prev, &next);

        let elements = live_map([rect(1)]);
        let (applied, visible) = delta
            .apply_to(&prev, &elements, ErrorPolicy::strict())
            .unwrap();

        assert!(applied.selected_element_ids.is_empty());
        assert!(visible);
    }

    #[test]
    fn test_emptied_group_is_filtered() {
        let group = GroupId::new(7);
        let prev = ObservedAppState::new();
        let next = ObservedAppState::new().with_selected_groups([group]);
        let delta = AppStateDelta::calculate(&prev, &next);

        // The only member of the group is deleted
        let elements = live_map([rect(1).with_group_ids(vec![group]).deleted()]);
        let (applied, visible) = delta
            .apply_to(&prev, &elements, ErrorPolicy::strict())
            .unwrap();

        assert!(applied.selected_group_ids.is_empty());
        assert!(!visible);
    }

    #[test]
    fn test_standalone_fields_are_always_visible() {
        let prev = ObservedAppState::new().with_name("untitled");
        let next = ObservedAppState::new().with_name("diagram");
        let delta = AppStateDelta::calculate(&prev, &next);

        let (applied, visible) = delta
            .apply_to(&prev, &ElementMap::new(), ErrorPolicy::strict())
            .unwrap();

        assert_eq!(applied.name, "diagram");
        assert!(visible);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let prev = ObservedAppState::new()
            .with_name("a")
            .with_selected_elements([ElementId::new(1)]);
        let next = ObservedAppState::new()
            .with_name("b")
            .with_selected_elements([ElementId::new(2)]);
        let delta = AppStateDelta::calculate(&prev, &next);

        let elements = live_map([rect(1), rect(2)]);
        let (forward, _) = delta
            .apply_to(&prev, &elements, ErrorPolicy::strict())
            .unwrap();
        assert_eq!(forward, next);

        let (back, _) = delta
            .inverse()
            .apply_to(&forward, &elements, ErrorPolicy::strict())
            .unwrap();
        assert_eq!(back, prev);
    }

    #[test]
    fn test_corrupt_payload_falls_back_to_input() {
        // Sides recording different field sets: a corrupt payload
        let corrupt = AppStateDelta {
            delta: Delta::new(
                ObservedPatch::default(),
                ObservedPatch {
                    name: Some("x".into()),
                    ..ObservedPatch::default()
                },
            ),
        };

        let prev = ObservedAppState::new().with_name("original");
        let strict = corrupt.apply_to(&prev, &ElementMap::new(), ErrorPolicy::strict());
        assert!(strict.is_err());

        let (fallback, visible) = corrupt
            .apply_to(&prev, &ElementMap::new(), ErrorPolicy::lenient())
            .unwrap();
        assert_eq!(fallback, prev);
        assert!(!visible);
    }

    #[test]
    fn test_cropping_reference_filtered_when_element_vanishes() {
        let prev = ObservedAppState::new();
        let mut next = ObservedAppState::new();
        next.cropping_element_id = Some(ElementId::new(3));
        let delta = AppStateDelta::calculate(&prev, &next);

        let (applied, visible) = delta
            .apply_to(&prev, &ElementMap::new(), ErrorPolicy::strict())
            .unwrap();
        assert_eq!(applied.cropping_element_id, None);
        assert!(!visible);
    }
}

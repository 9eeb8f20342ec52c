//! Observed app-state projection
//!
//! The subset of UI state that references element ids and therefore has to
//! be reconciled against element deletions, plus the two standalone
//! document fields. Everything else in the application's UI state is
//! invisible to the synchronization engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ElementId, GroupId};

/// The observed slice of UI state.
///
/// Selection sets can dangle-reference deleted elements or emptied groups;
/// `AppStateDelta::apply_to` filters those out at replay time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedAppState {
    /// Document name (standalone; never references elements)
    pub name: String,
    /// Canvas background color (standalone)
    pub view_background_color: String,
    pub selected_element_ids: BTreeSet<ElementId>,
    pub selected_group_ids: BTreeSet<GroupId>,
    pub editing_group_id: Option<GroupId>,
    pub selected_linear_element_id: Option<ElementId>,
    pub editing_linear_element_id: Option<ElementId>,
    pub cropping_element_id: Option<ElementId>,
}

impl ObservedAppState {
    pub fn new() -> Self {
        ObservedAppState::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_view_background_color(mut self, color: impl Into<String>) -> Self {
        self.view_background_color = color.into();
        self
    }

    pub fn with_selected_elements(mut self, ids: impl IntoIterator<Item = ElementId>) -> Self {
        self.selected_element_ids = ids.into_iter().collect();
        self
    }

    pub fn with_selected_groups(mut self, ids: impl IntoIterator<Item = GroupId>) -> Self {
        self.selected_group_ids = ids.into_iter().collect();
        self
    }

    /// True when no field references any element or group
    pub fn has_no_references(&self) -> bool {
        self.selected_element_ids.is_empty()
            && self.selected_group_ids.is_empty()
            && self.editing_group_id.is_none()
            && self.selected_linear_element_id.is_none()
            && self.editing_linear_element_id.is_none()
            && self.cropping_element_id.is_none()
    }
}

//! Plain wire shape for delta payloads
//!
//! Transport and persistence exchange deltas as plain objects:
//! `{added, removed, updated}` of id → `{deleted, inserted}` for element
//! change-sets, `{delta: {deleted, inserted}}` for observed-state
//! change-sets. No framing and no version header — this subsystem owns
//! neither. `restore` is DTO hydration only: it re-runs the `create`
//! invariant checks and recomputes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vellum_core::{ElementId, ErrorPolicy, VellumResult};

use crate::app_state::{AppStateDelta, ObservedDelta};
use crate::elements::{ElementDelta, ElementsDelta};

/// Wire shape of an [`ElementsDelta`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementsDeltaDto {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub added: BTreeMap<ElementId, ElementDelta>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub removed: BTreeMap<ElementId, ElementDelta>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub updated: BTreeMap<ElementId, ElementDelta>,
}

/// Wire shape of an [`AppStateDelta`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStateDeltaDto {
    pub delta: ObservedDelta,
}

impl ElementsDelta {
    pub fn to_wire(&self) -> ElementsDeltaDto {
        ElementsDeltaDto {
            added: self.added().clone(),
            removed: self.removed().clone(),
            updated: self.updated().clone(),
        }
    }

    /// Hydrate a change-set from its wire shape
    pub fn restore(dto: ElementsDeltaDto, policy: ErrorPolicy) -> VellumResult<Self> {
        ElementsDelta::create(dto.added, dto.removed, dto.updated, policy)
    }
}

impl AppStateDelta {
    pub fn to_wire(&self) -> AppStateDeltaDto {
        AppStateDeltaDto {
            delta: self.delta().clone(),
        }
    }

    /// Hydrate a change-set from its wire shape
    pub fn restore(dto: AppStateDeltaDto, policy: ErrorPolicy) -> VellumResult<Self> {
        AppStateDelta::create(dto.delta, policy)
    }
}

//! Element model
//!
//! Elements are the addressable records of a drawing-surface scene. They
//! are immutable value records: every committed mutation produces a new
//! `Element` behind a fresh `Arc`, bumps the monotonic `version` and
//! regenerates the random `version_nonce` used to break ties between
//! concurrent equal-version edits.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ElementId, GroupId};

/// Z-ordering key. Lexicographic; opaque to the engine, produced by the
/// surrounding application's ordering layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey(pub String);

impl OrderKey {
    pub fn new(key: impl Into<String>) -> Self {
        OrderKey(key.into())
    }
}

/// Shape classification of an element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Diamond,
    Arrow,
    Line,
    Text,
    Image,
    Frame,
}

/// What a binding attaches to an element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Arrow,
    Text,
}

/// A relation to another element (arrow endpoint, text label), keyed by
/// the bound element's id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub id: ElementId,
    pub kind: BindingKind,
}

impl Binding {
    pub fn new(id: ElementId, kind: BindingKind) -> Self {
        Binding { id, kind }
    }
}

/// Crop window of an image element, in natural-image coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub natural_width: f64,
    pub natural_height: f64,
}

/// A drawing-surface element.
///
/// `id`, `version`, `version_nonce` and `updated` are metadata: they
/// identify and order concurrent edits but are never diffed as content.
/// Everything else is content and participates in delta calculation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    // Metadata
    pub id: ElementId,
    /// Monotonic per-element edit counter
    pub version: u64,
    /// Random tiebreaker for concurrent equal-version edits
    pub version_nonce: u64,
    /// Wall-clock milliseconds, stamped by the mutation layer
    pub updated: u64,

    // Content
    /// Soft-delete flag; deleted elements stay addressable
    pub is_deleted: bool,
    /// Z-ordering key
    pub index: OrderKey,
    pub shape: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
    pub stroke_color: String,
    pub background_color: String,
    pub opacity: u8,
    pub locked: bool,
    pub link: Option<String>,
    /// Scalar-replace: the whole list is the value
    pub group_ids: Vec<GroupId>,
    /// Keyed relation, diffed and merged by bound element id
    pub bound_elements: Vec<Binding>,
    /// Image crop; applied verbatim (override or clear), never merged
    pub crop: Option<Crop>,
}

impl Element {
    /// Create a fresh element with default content at version 1
    pub fn new(id: ElementId, shape: ShapeKind) -> Self {
        Element {
            id,
            version: 1,
            version_nonce: rand::random(),
            updated: 0,
            is_deleted: false,
            index: OrderKey::default(),
            shape,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
            stroke_color: String::from("#1e1e1e"),
            background_color: String::from("transparent"),
            opacity: 100,
            locked: false,
            link: None,
            group_ids: Vec::new(),
            bound_elements: Vec::new(),
            crop: None,
        }
    }

    pub fn with_index(mut self, index: OrderKey) -> Self {
        self.index = index;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_stroke_color(mut self, color: impl Into<String>) -> Self {
        self.stroke_color = color.into();
        self
    }

    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = color.into();
        self
    }

    pub fn with_group_ids(mut self, group_ids: Vec<GroupId>) -> Self {
        self.group_ids = group_ids;
        self
    }

    pub fn with_bound_elements(mut self, bound_elements: Vec<Binding>) -> Self {
        self.bound_elements = bound_elements;
        self
    }

    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_version_nonce(mut self, nonce: u64) -> Self {
        self.version_nonce = nonce;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    /// Seal a mutation: bump the version, regenerate the nonce, restamp
    /// the modification time
    pub fn committed(mut self, now_ms: u64) -> Self {
        self.version += 1;
        self.version_nonce = rand::random();
        self.updated = now_ms;
        self
    }

    /// Visible means present in the working set and not soft-deleted
    #[inline]
    pub fn is_visible(&self) -> bool {
        !self.is_deleted
    }
}

/// The id-indexed working set of a scene. Iteration order is the id order,
/// which keeps replays and tests deterministic; z-order lives in
/// [`Element::index`], not in map order.
pub type ElementMap = BTreeMap<ElementId, Arc<Element>>;

/// An ordered scene, as held by renderers and the reconciler
pub type Sequence = Vec<Arc<Element>>;

/// Build an [`ElementMap`] from an ordered sequence. Later duplicates of
/// an id replace earlier ones.
pub fn sequence_to_map(sequence: &[Arc<Element>]) -> ElementMap {
    sequence
        .iter()
        .map(|element| (element.id, element.clone()))
        .collect()
}

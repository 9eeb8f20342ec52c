//! Typed partials for the element and observed-state records
//!
//! Each record enumerates its content fields in a field enum and carries a
//! patch struct with one optional slot per field. The merge strategy of a
//! field is visible in its slot type:
//!
//! - plain `Option<T>` — scalar-replace
//! - `Option<BTreeSet<_>>` — presence set; the deleted side holds removed
//!   keys, the inserted side holds added keys
//! - `Option<Vec<Binding>>` — keyed array, diffed and merged by bound id
//! - `Option<SetOrClear<T>>` — verbatim override-or-clear, never merged
//!
//! Metadata (id, version, version nonce, updated stamp) has no slot and
//! can never leak into a delta.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use vellum_core::{Binding, Crop, Element, ElementId, GroupId, ObservedAppState, OrderKey, ShapeKind};

use crate::delta::{diff_keyed, diff_sets, merge_keyed, merge_sets, Diffable, Patch};

/// Override-or-clear patch value for optional scalar fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOrClear<T> {
    Set(T),
    Clear,
}

impl<T: Clone> SetOrClear<T> {
    pub fn from_option(value: &Option<T>) -> Self {
        match value {
            Some(v) => SetOrClear::Set(v.clone()),
            None => SetOrClear::Clear,
        }
    }

    pub fn to_option(&self) -> Option<T> {
        match self {
            SetOrClear::Set(v) => Some(v.clone()),
            SetOrClear::Clear => None,
        }
    }
}

/// Content fields of [`Element`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementField {
    IsDeleted,
    Index,
    Shape,
    X,
    Y,
    Width,
    Height,
    Angle,
    StrokeColor,
    BackgroundColor,
    Opacity,
    Locked,
    Link,
    GroupIds,
    BoundElements,
    Crop,
}

/// Partial element content
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<OrderKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<SetOrClear<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_ids: Option<Vec<GroupId>>,
    /// On the deleted side: bindings removed; on the inserted side:
    /// bindings added or replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_elements: Option<Vec<Binding>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<SetOrClear<Crop>>,
}

impl ElementPatch {
    /// The deleted side of a synthesized addition and the inserted side
    /// of a synthesized removal
    pub fn tombstone() -> Self {
        ElementPatch {
            is_deleted: Some(true),
            ..ElementPatch::default()
        }
    }

    /// Overwrite one field of this partial with the value `src` records
    /// for it. `src` must contain the field.
    pub fn adopt(&mut self, src: &ElementPatch, field: ElementField) {
        match field {
            ElementField::IsDeleted => self.is_deleted = src.is_deleted,
            ElementField::Index => self.index = src.index.clone(),
            ElementField::Shape => self.shape = src.shape,
            ElementField::X => self.x = src.x,
            ElementField::Y => self.y = src.y,
            ElementField::Width => self.width = src.width,
            ElementField::Height => self.height = src.height,
            ElementField::Angle => self.angle = src.angle,
            ElementField::StrokeColor => self.stroke_color = src.stroke_color.clone(),
            ElementField::BackgroundColor => {
                self.background_color = src.background_color.clone()
            }
            ElementField::Opacity => self.opacity = src.opacity,
            ElementField::Locked => self.locked = src.locked,
            ElementField::Link => self.link = src.link.clone(),
            ElementField::GroupIds => self.group_ids = src.group_ids.clone(),
            ElementField::BoundElements => self.bound_elements = src.bound_elements.clone(),
            ElementField::Crop => self.crop = src.crop.clone(),
        }
    }
}

impl Patch for ElementPatch {
    type Field = ElementField;

    const ALL: &'static [ElementField] = &[
        ElementField::IsDeleted,
        ElementField::Index,
        ElementField::Shape,
        ElementField::X,
        ElementField::Y,
        ElementField::Width,
        ElementField::Height,
        ElementField::Angle,
        ElementField::StrokeColor,
        ElementField::BackgroundColor,
        ElementField::Opacity,
        ElementField::Locked,
        ElementField::Link,
        ElementField::GroupIds,
        ElementField::BoundElements,
        ElementField::Crop,
    ];

    fn fields(&self) -> Vec<ElementField> {
        Self::ALL
            .iter()
            .copied()
            .filter(|&field| self.contains(field))
            .collect()
    }

    fn contains(&self, field: ElementField) -> bool {
        match field {
            ElementField::IsDeleted => self.is_deleted.is_some(),
            ElementField::Index => self.index.is_some(),
            ElementField::Shape => self.shape.is_some(),
            ElementField::X => self.x.is_some(),
            ElementField::Y => self.y.is_some(),
            ElementField::Width => self.width.is_some(),
            ElementField::Height => self.height.is_some(),
            ElementField::Angle => self.angle.is_some(),
            ElementField::StrokeColor => self.stroke_color.is_some(),
            ElementField::BackgroundColor => self.background_color.is_some(),
            ElementField::Opacity => self.opacity.is_some(),
            ElementField::Locked => self.locked.is_some(),
            ElementField::Link => self.link.is_some(),
            ElementField::GroupIds => self.group_ids.is_some(),
            ElementField::BoundElements => self.bound_elements.is_some(),
            ElementField::Crop => self.crop.is_some(),
        }
    }

    fn clear(&mut self, field: ElementField) {
        match field {
            ElementField::IsDeleted => self.is_deleted = None,
            ElementField::Index => self.index = None,
            ElementField::Shape => self.shape = None,
            ElementField::X => self.x = None,
            ElementField::Y => self.y = None,
            ElementField::Width => self.width = None,
            ElementField::Height => self.height = None,
            ElementField::Angle => self.angle = None,
            ElementField::StrokeColor => self.stroke_color = None,
            ElementField::BackgroundColor => self.background_color = None,
            ElementField::Opacity => self.opacity = None,
            ElementField::Locked => self.locked = None,
            ElementField::Link => self.link = None,
            ElementField::GroupIds => self.group_ids = None,
            ElementField::BoundElements => self.bound_elements = None,
            ElementField::Crop => self.crop = None,
        }
    }

    fn field_eq(&self, other: &Self, field: ElementField) -> bool {
        match field {
            ElementField::IsDeleted => self.is_deleted.is_some() && self.is_deleted == other.is_deleted,
            ElementField::Index => self.index.is_some() && self.index == other.index,
            ElementField::Shape => self.shape.is_some() && self.shape == other.shape,
            ElementField::X => self.x.is_some() && self.x == other.x,
            ElementField::Y => self.y.is_some() && self.y == other.y,
            ElementField::Width => self.width.is_some() && self.width == other.width,
            ElementField::Height => self.height.is_some() && self.height == other.height,
            ElementField::Angle => self.angle.is_some() && self.angle == other.angle,
            ElementField::StrokeColor => {
                self.stroke_color.is_some() && self.stroke_color == other.stroke_color
            }
            ElementField::BackgroundColor => {
                self.background_color.is_some() && self.background_color == other.background_color
            }
            ElementField::Opacity => self.opacity.is_some() && self.opacity == other.opacity,
            ElementField::Locked => self.locked.is_some() && self.locked == other.locked,
            ElementField::Link => self.link.is_some() && self.link == other.link,
            ElementField::GroupIds => self.group_ids.is_some() && self.group_ids == other.group_ids,
            ElementField::BoundElements => {
                self.bound_elements.is_some() && self.bound_elements == other.bound_elements
            }
            ElementField::Crop => self.crop.is_some() && self.crop == other.crop,
        }
    }
}

impl Diffable for Element {
    type Patch = ElementPatch;

    fn diff(prev: &Element, next: &Element) -> (ElementPatch, ElementPatch) {
        let mut deleted = ElementPatch::default();
        let mut inserted = ElementPatch::default();

        if prev.is_deleted != next.is_deleted {
            deleted.is_deleted = Some(prev.is_deleted);
            inserted.is_deleted = Some(next.is_deleted);
        }
        if prev.index != next.index {
            deleted.index = Some(prev.index.clone());
            inserted.index = Some(next.index.clone());
        }
        if prev.shape != next.shape {
            deleted.shape = Some(prev.shape);
            inserted.shape = Some(next.shape);
        }
        if prev.x != next.x {
            deleted.x = Some(prev.x);
            inserted.x = Some(next.x);
        }
        if prev.y != next.y {
            deleted.y = Some(prev.y);
            inserted.y = Some(next.y);
        }
        if prev.width != next.width {
            deleted.width = Some(prev.width);
            inserted.width = Some(next.width);
        }
        if prev.height != next.height {
            deleted.height = Some(prev.height);
            inserted.height = Some(next.height);
        }
        if prev.angle != next.angle {
            deleted.angle = Some(prev.angle);
            inserted.angle = Some(next.angle);
        }
        if prev.stroke_color != next.stroke_color {
            deleted.stroke_color = Some(prev.stroke_color.clone());
            inserted.stroke_color = Some(next.stroke_color.clone());
        }
        if prev.background_color != next.background_color {
            deleted.background_color = Some(prev.background_color.clone());
            inserted.background_color = Some(next.background_color.clone());
        }
        if prev.opacity != next.opacity {
            deleted.opacity = Some(prev.opacity);
            inserted.opacity = Some(next.opacity);
        }
        if prev.locked != next.locked {
            deleted.locked = Some(prev.locked);
            inserted.locked = Some(next.locked);
        }
        if prev.link != next.link {
            deleted.link = Some(SetOrClear::from_option(&prev.link));
            inserted.link = Some(SetOrClear::from_option(&next.link));
        }
        if prev.group_ids != next.group_ids {
            deleted.group_ids = Some(prev.group_ids.clone());
            inserted.group_ids = Some(next.group_ids.clone());
        }
        if let Some((removed, added)) =
            diff_keyed(&prev.bound_elements, &next.bound_elements, |binding| binding.id)
        {
            deleted.bound_elements = Some(removed);
            inserted.bound_elements = Some(added);
        }
        if prev.crop != next.crop {
            deleted.crop = Some(SetOrClear::from_option(&prev.crop));
            inserted.crop = Some(SetOrClear::from_option(&next.crop));
        }

        (deleted, inserted)
    }

    fn apply(&self, deleted: &ElementPatch, inserted: &ElementPatch) -> Element {
        let mut next = self.clone();

        if let Some(is_deleted) = inserted.is_deleted {
            next.is_deleted = is_deleted;
        }
        if let Some(index) = &inserted.index {
            next.index = index.clone();
        }
        if let Some(shape) = inserted.shape {
            next.shape = shape;
        }
        if let Some(x) = inserted.x {
            next.x = x;
        }
        if let Some(y) = inserted.y {
            next.y = y;
        }
        if let Some(width) = inserted.width {
            next.width = width;
        }
        if let Some(height) = inserted.height {
            next.height = height;
        }
        if let Some(angle) = inserted.angle {
            next.angle = angle;
        }
        if let Some(stroke_color) = &inserted.stroke_color {
            next.stroke_color = stroke_color.clone();
        }
        if let Some(background_color) = &inserted.background_color {
            next.background_color = background_color.clone();
        }
        if let Some(opacity) = inserted.opacity {
            next.opacity = opacity;
        }
        if let Some(locked) = inserted.locked {
            next.locked = locked;
        }
        if let Some(link) = &inserted.link {
            next.link = link.to_option();
        }
        if let Some(group_ids) = &inserted.group_ids {
            next.group_ids = group_ids.clone();
        }
        if inserted.bound_elements.is_some() || deleted.bound_elements.is_some() {
            let added = inserted.bound_elements.as_deref().unwrap_or(&[]);
            let removed = deleted.bound_elements.as_deref().unwrap_or(&[]);
            next.bound_elements =
                merge_keyed(&self.bound_elements, added, removed, |binding| binding.id);
        }
        if let Some(crop) = &inserted.crop {
            // Verbatim override or clear; crops are never partially merged
            next.crop = crop.to_option();
        }

        next
    }

    fn capture(&self) -> ElementPatch {
        ElementPatch {
            is_deleted: Some(self.is_deleted),
            index: Some(self.index.clone()),
            shape: Some(self.shape),
            x: Some(self.x),
            y: Some(self.y),
            width: Some(self.width),
            height: Some(self.height),
            angle: Some(self.angle),
            stroke_color: Some(self.stroke_color.clone()),
            background_color: Some(self.background_color.clone()),
            opacity: Some(self.opacity),
            locked: Some(self.locked),
            link: Some(SetOrClear::from_option(&self.link)),
            group_ids: Some(self.group_ids.clone()),
            bound_elements: Some(self.bound_elements.clone()),
            crop: Some(SetOrClear::from_option(&self.crop)),
        }
    }

    fn differs(prev: &Element, next: &Element) -> bool {
        if prev.is_deleted != next.is_deleted {
            return true;
        }
        if prev.index != next.index {
            return true;
        }
        if prev.shape != next.shape {
            return true;
        }
        if prev.x != next.x || prev.y != next.y {
            return true;
        }
        if prev.width != next.width || prev.height != next.height {
            return true;
        }
        if prev.angle != next.angle {
            return true;
        }
        if prev.stroke_color != next.stroke_color {
            return true;
        }
        if prev.background_color != next.background_color {
            return true;
        }
        if prev.opacity != next.opacity || prev.locked != next.locked {
            return true;
        }
        if prev.link != next.link {
            return true;
        }
        if prev.group_ids != next.group_ids {
            return true;
        }
        if prev.bound_elements != next.bound_elements {
            return true;
        }
        prev.crop != next.crop
    }
}

/// Fields of [`ObservedAppState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObservedField {
    Name,
    ViewBackgroundColor,
    SelectedElementIds,
    SelectedGroupIds,
    EditingGroupId,
    SelectedLinearElementId,
    EditingLinearElementId,
    CroppingElementId,
}

impl ObservedField {
    /// Standalone fields never reference elements and need no filtering
    pub fn is_standalone(self) -> bool {
        matches!(self, ObservedField::Name | ObservedField::ViewBackgroundColor)
    }
}

/// Partial observed app state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_background_color: Option<String>,
    /// Presence diff: removed ids on the deleted side, added ids on the
    /// inserted side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_element_ids: Option<BTreeSet<ElementId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_group_ids: Option<BTreeSet<GroupId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_group_id: Option<SetOrClear<GroupId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_linear_element_id: Option<SetOrClear<ElementId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_linear_element_id: Option<SetOrClear<ElementId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cropping_element_id: Option<SetOrClear<ElementId>>,
}

impl Patch for ObservedPatch {
    type Field = ObservedField;

    const ALL: &'static [ObservedField] = &[
        ObservedField::Name,
        ObservedField::ViewBackgroundColor,
        ObservedField::SelectedElementIds,
        ObservedField::SelectedGroupIds,
        ObservedField::EditingGroupId,
        ObservedField::SelectedLinearElementId,
        ObservedField::EditingLinearElementId,
        ObservedField::CroppingElementId,
    ];

    fn fields(&self) -> Vec<ObservedField> {
        Self::ALL
            .iter()
            .copied()
            .filter(|&field| self.contains(field))
            .collect()
    }

    fn contains(&self, field: ObservedField) -> bool {
        match field {
            ObservedField::Name => self.name.is_some(),
            ObservedField::ViewBackgroundColor => self.view_background_color.is_some(),
            ObservedField::SelectedElementIds => self.selected_element_ids.is_some(),
            ObservedField::SelectedGroupIds => self.selected_group_ids.is_some(),
            ObservedField::EditingGroupId => self.editing_group_id.is_some(),
            ObservedField::SelectedLinearElementId => self.selected_linear_element_id.is_some(),
            ObservedField::EditingLinearElementId => self.editing_linear_element_id.is_some(),
            ObservedField::CroppingElementId => self.cropping_element_id.is_some(),
        }
    }

    fn clear(&mut self, field: ObservedField) {
        match field {
            ObservedField::Name => self.name = None,
            ObservedField::ViewBackgroundColor => self.view_background_color = None,
            ObservedField::SelectedElementIds => self.selected_element_ids = None,
            ObservedField::SelectedGroupIds => self.selected_group_ids = None,
            ObservedField::EditingGroupId => self.editing_group_id = None,
            ObservedField::SelectedLinearElementId => self.selected_linear_element_id = None,
            ObservedField::EditingLinearElementId => self.editing_linear_element_id = None,
            ObservedField::CroppingElementId => self.cropping_element_id = None,
        }
    }

    fn field_eq(&self, other: &Self, field: ObservedField) -> bool {
        match field {
            ObservedField::Name => self.name.is_some() && self.name == other.name,
            ObservedField::ViewBackgroundColor => {
                self.view_background_color.is_some()
                    && self.view_background_color == other.view_background_color
            }
            ObservedField::SelectedElementIds => {
                self.selected_element_ids.is_some()
                    && self.selected_element_ids == other.selected_element_ids
            }
            ObservedField::SelectedGroupIds => {
                self.selected_group_ids.is_some()
                    && self.selected_group_ids == other.selected_group_ids
            }
            ObservedField::EditingGroupId => {
                self.editing_group_id.is_some() && self.editing_group_id == other.editing_group_id
            }
            ObservedField::SelectedLinearElementId => {
                self.selected_linear_element_id.is_some()
                    && self.selected_linear_element_id == other.selected_linear_element_id
            }
            ObservedField::EditingLinearElementId => {
                self.editing_linear_element_id.is_some()
                    && self.editing_linear_element_id == other.editing_linear_element_id
            }
            ObservedField::CroppingElementId => {
                self.cropping_element_id.is_some()
                    && self.cropping_element_id == other.cropping_element_id
            }
        }
    }
}

impl Diffable for ObservedAppState {
    type Patch = ObservedPatch;

    fn diff(prev: &ObservedAppState, next: &ObservedAppState) -> (ObservedPatch, ObservedPatch) {
        let mut deleted = ObservedPatch::default();
        let mut inserted = ObservedPatch::default();

        if prev.name != next.name {
            deleted.name = Some(prev.name.clone());
            inserted.name = Some(next.name.clone());
        }
        if prev.view_background_color != next.view_background_color {
            deleted.view_background_color = Some(prev.view_background_color.clone());
            inserted.view_background_color = Some(next.view_background_color.clone());
        }
        if let Some((removed, added)) =
            diff_sets(&prev.selected_element_ids, &next.selected_element_ids)
        {
            deleted.selected_element_ids = Some(removed);
            inserted.selected_element_ids = Some(added);
        }
        if let Some((removed, added)) = diff_sets(&prev.selected_group_ids, &next.selected_group_ids)
        {
            deleted.selected_group_ids = Some(removed);
            inserted.selected_group_ids = Some(added);
        }
        if prev.editing_group_id != next.editing_group_id {
            deleted.editing_group_id = Some(SetOrClear::from_option(&prev.editing_group_id));
            inserted.editing_group_id = Some(SetOrClear::from_option(&next.editing_group_id));
        }
        if prev.selected_linear_element_id != next.selected_linear_element_id {
            deleted.selected_linear_element_id =
                Some(SetOrClear::from_option(&prev.selected_linear_element_id));
            inserted.selected_linear_element_id =
                Some(SetOrClear::from_option(&next.selected_linear_element_id));
        }
        if prev.editing_linear_element_id != next.editing_linear_element_id {
            deleted.editing_linear_element_id =
                Some(SetOrClear::from_option(&prev.editing_linear_element_id));
            inserted.editing_linear_element_id =
                Some(SetOrClear::from_option(&next.editing_linear_element_id));
        }
        if prev.cropping_element_id != next.cropping_element_id {
            deleted.cropping_element_id = Some(SetOrClear::from_option(&prev.cropping_element_id));
            inserted.cropping_element_id = Some(SetOrClear::from_option(&next.cropping_element_id));
        }

        (deleted, inserted)
    }

    fn apply(&self, deleted: &ObservedPatch, inserted: &ObservedPatch) -> ObservedAppState {
        let mut next = self.clone();

        if let Some(name) = &inserted.name {
            next.name = name.clone();
        }
        if let Some(color) = &inserted.view_background_color {
            next.view_background_color = color.clone();
        }
        if inserted.selected_element_ids.is_some() || deleted.selected_element_ids.is_some() {
            let empty = BTreeSet::new();
            let added = inserted.selected_element_ids.as_ref().unwrap_or(&empty);
            let removed = deleted.selected_element_ids.as_ref().unwrap_or(&empty);
            next.selected_element_ids = merge_sets(&self.selected_element_ids, added, removed);
        }
        if inserted.selected_group_ids.is_some() || deleted.selected_group_ids.is_some() {
            let empty = BTreeSet::new();
            let added = inserted.selected_group_ids.as_ref().unwrap_or(&empty);
            let removed = deleted.selected_group_ids.as_ref().unwrap_or(&empty);
            next.selected_group_ids = merge_sets(&self.selected_group_ids, added, removed);
        }
        if let Some(editing_group_id) = &inserted.editing_group_id {
            next.editing_group_id = editing_group_id.to_option();
        }
        if let Some(id) = &inserted.selected_linear_element_id {
            next.selected_linear_element_id = id.to_option();
        }
        if let Some(id) = &inserted.editing_linear_element_id {
            next.editing_linear_element_id = id.to_option();
        }
        if let Some(id) = &inserted.cropping_element_id {
            next.cropping_element_id = id.to_option();
        }

        next
    }

    fn capture(&self) -> ObservedPatch {
        ObservedPatch {
            name: Some(self.name.clone()),
            view_background_color: Some(self.view_background_color.clone()),
            selected_element_ids: Some(self.selected_element_ids.clone()),
            selected_group_ids: Some(self.selected_group_ids.clone()),
            editing_group_id: Some(SetOrClear::from_option(&self.editing_group_id)),
            selected_linear_element_id: Some(SetOrClear::from_option(
                &self.selected_linear_element_id,
            )),
            editing_linear_element_id: Some(SetOrClear::from_option(
                &self.editing_linear_element_id,
            )),
            cropping_element_id: Some(SetOrClear::from_option(&self.cropping_element_id)),
        }
    }

    fn differs(prev: &ObservedAppState, next: &ObservedAppState) -> bool {
        prev != next
    }
}

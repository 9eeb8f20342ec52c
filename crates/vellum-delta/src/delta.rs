//! The structural diff primitive
//!
//! A [`Delta`] is an immutable pair of same-shaped partial records: what a
//! mutation removed (`deleted`) and what it introduced (`inserted`).
//! Partials are typed: each record enumerates its fields in a dedicated
//! field enum and declares per-field merge strategies in its patch type,
//! so the compiler checks what a dynamic-property diff would only catch at
//! runtime.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed partial record: some subset of a record's content fields.
pub trait Patch: Clone + fmt::Debug + Default + PartialEq {
    /// The record's enumerated field list
    type Field: Copy + Eq + Ord + fmt::Debug + 'static;

    /// Every content field of the record, in declaration order
    const ALL: &'static [Self::Field];

    /// Fields present in this partial
    fn fields(&self) -> Vec<Self::Field>;

    /// Whether a field is present in this partial
    fn contains(&self, field: Self::Field) -> bool;

    /// Remove a field from this partial
    fn clear(&mut self, field: Self::Field);

    /// Whether a field is present on both sides with equal values
    fn field_eq(&self, other: &Self, field: Self::Field) -> bool;

    fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// A record the engine can diff and patch.
///
/// Implementations enumerate content fields explicitly; metadata fields
/// (id, version, version nonce, modification stamp) never appear in
/// patches.
pub trait Diffable: Sized {
    type Patch: Patch;

    /// Full field-union diff. Both returned partials record the same
    /// field set: every differing field appears on both sides, even when
    /// only one side has a meaningful value. Record-valued fields are
    /// refined to their nested difference and omitted entirely when no
    /// nested difference remains.
    fn diff(prev: &Self, next: &Self) -> (Self::Patch, Self::Patch);

    /// Produce a new record with the delta applied. Scalar fields take
    /// the inserted value; set and keyed-array fields merge the deleted
    /// side out and the inserted side in.
    fn apply(&self, deleted: &Self::Patch, inserted: &Self::Patch) -> Self;

    /// Full-state partial: every content field, with current values
    fn capture(&self) -> Self::Patch;

    /// First-difference check; returns on the first differing field
    fn differs(prev: &Self, next: &Self) -> bool;
}

/// Which side(s) of a delta a transform applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifierScope {
    Deleted,
    Inserted,
    Both,
}

/// Shared contract for invertible change-sets
pub trait ChangeSet: Sized {
    /// The symmetric opposite: applying it undoes applying `self`
    fn inverse(&self) -> Self;

    fn is_empty(&self) -> bool;
}

/// An immutable structural diff between two versions of a record.
///
/// Never mutated after creation; history holds deltas as committed and
/// derives the undo direction through [`ChangeSet::inverse`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta<P> {
    pub deleted: P,
    pub inserted: P,
}

impl<P: Patch> Delta<P> {
    /// Freeze a (deleted, inserted) pair
    pub fn new(deleted: P, inserted: P) -> Self {
        Delta { deleted, inserted }
    }

    /// Freeze a pair after transforming one or both sides
    pub fn mapped(
        mut deleted: P,
        mut inserted: P,
        scope: ModifierScope,
        modifier: impl Fn(&mut P),
    ) -> Self {
        match scope {
            ModifierScope::Deleted => modifier(&mut deleted),
            ModifierScope::Inserted => modifier(&mut inserted),
            ModifierScope::Both => {
                modifier(&mut deleted);
                modifier(&mut inserted);
            }
        }
        Delta { deleted, inserted }
    }

    /// Compute the full key-union diff of two records
    pub fn calculate<T: Diffable<Patch = P>>(prev: &T, next: &T) -> Self {
        let (deleted, inserted) = T::diff(prev, next);
        Delta { deleted, inserted }
    }

    pub fn empty() -> Self {
        Delta::default()
    }
}

impl<P: Patch> ChangeSet for Delta<P> {
    fn inverse(&self) -> Self {
        Delta {
            deleted: self.inserted.clone(),
            inserted: self.deleted.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.inserted.is_empty()
    }
}

/// One-sided difference check without materializing a delta
pub fn is_different<T: Diffable>(a: &T, b: &T) -> bool {
    T::differs(a, b)
}

/// Whether `left` records any field absent or different in `right`;
/// returns on the first difference
pub fn is_left_different<P: Patch>(left: &P, right: &P) -> bool {
    left.fields()
        .into_iter()
        .any(|field| !left.field_eq(right, field))
}

/// Whether `right` records any field absent or different in `left`
pub fn is_right_different<P: Patch>(left: &P, right: &P) -> bool {
    right
        .fields()
        .into_iter()
        .any(|field| !right.field_eq(left, field))
}

/// Fields present in `left` that are absent or different in `right`
pub fn left_differences<P: Patch>(left: &P, right: &P) -> Vec<P::Field> {
    left.fields()
        .into_iter()
        .filter(|&field| !left.field_eq(right, field))
        .collect()
}

/// Fields present in `right` that are absent or different in `left`
pub fn right_differences<P: Patch>(left: &P, right: &P) -> Vec<P::Field> {
    right
        .fields()
        .into_iter()
        .filter(|&field| !right.field_eq(left, field))
        .collect()
}

/// Nested presence diff of two id sets.
///
/// Returns `(removed, added)`: keys only in `prev` and keys only in
/// `next`. `None` when no nested difference remains, in which case the
/// field is stripped from both sides of the delta.
pub fn diff_sets<K: Ord + Clone>(
    prev: &BTreeSet<K>,
    next: &BTreeSet<K>,
) -> Option<(BTreeSet<K>, BTreeSet<K>)> {
    let removed: BTreeSet<K> = prev.difference(next).cloned().collect();
    let added: BTreeSet<K> = next.difference(prev).cloned().collect();

    if removed.is_empty() && added.is_empty() {
        None
    } else {
        Some((removed, added))
    }
}

/// Reconstruct a full set from a base plus a removed-key set and an
/// added-key set; the apply-side counterpart of [`diff_sets`]
pub fn merge_sets<K: Ord + Clone>(
    base: &BTreeSet<K>,
    added: &BTreeSet<K>,
    removed: &BTreeSet<K>,
) -> BTreeSet<K> {
    let mut merged = base.clone();
    for key in removed {
        merged.remove(key);
    }
    for key in added {
        merged.insert(key.clone());
    }
    merged
}

/// Nested diff of two keyed arrays, grouped by `key_of`.
///
/// Returns `(removed, added)`. An entry whose key survives but whose
/// value changed appears on both sides, so merging replaces it.
pub fn diff_keyed<T: Clone + PartialEq, K: Ord>(
    prev: &[T],
    next: &[T],
    key_of: impl Fn(&T) -> K,
) -> Option<(Vec<T>, Vec<T>)> {
    let prev_keys: BTreeSet<K> = prev.iter().map(&key_of).collect();
    let next_keys: BTreeSet<K> = next.iter().map(&key_of).collect();

    let mut removed: Vec<T> = Vec::new();
    let mut added: Vec<T> = Vec::new();

    for item in prev {
        let key = key_of(item);
        if !next_keys.contains(&key) {
            removed.push(item.clone());
        } else if let Some(counterpart) = next.iter().find(|n| key_of(*n) == key) {
            if counterpart != item {
                removed.push(item.clone());
            }
        }
    }
    for item in next {
        let key = key_of(item);
        if !prev_keys.contains(&key) {
            added.push(item.clone());
        } else if let Some(counterpart) = prev.iter().find(|p| key_of(*p) == key) {
            if counterpart != item {
                added.push(item.clone());
            }
        }
    }

    if removed.is_empty() && added.is_empty() {
        None
    } else {
        Some((removed, added))
    }
}

/// Reconstruct a full keyed array from a base plus removed and added
/// entries, preserving base order; the apply-side counterpart of
/// [`diff_keyed`]
pub fn merge_keyed<T: Clone, K: Ord>(
    base: &[T],
    added: &[T],
    removed: &[T],
    key_of: impl Fn(&T) -> K,
) -> Vec<T> {
    let removed_keys: BTreeSet<K> = removed.iter().map(&key_of).collect();
    let added_keys: BTreeSet<K> = added.iter().map(&key_of).collect();

    // Drop removed entries, unless the same key is also being re-added
    // (a value replacement), in which case the slot is kept and rewritten.
    let mut merged: Vec<T> = Vec::with_capacity(base.len() + added.len());
    for item in base {
        let key = key_of(item);
        if removed_keys.contains(&key) && !added_keys.contains(&key) {
            continue;
        }
        if let Some(replacement) = added.iter().find(|a| key_of(*a) == key) {
            merged.push(replacement.clone());
        } else {
            merged.push(item.clone());
        }
    }
    for item in added {
        let key = key_of(item);
        if !merged.iter().any(|m| key_of(m) == key) {
            merged.push(item.clone());
        }
    }
    merged
}

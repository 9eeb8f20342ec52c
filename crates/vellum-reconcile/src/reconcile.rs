//! Sequence reconciliation
//!
//! Remote batches arrive as elements with an optional parent hint: the id
//! the element must immediately follow, or a sentinel for the front of the
//! sequence. Content conflicts resolve per id by version, ties by nonce;
//! order conflicts resolve by splicing hinted elements after their parent,
//! chaining contiguous hinted runs so a batch keeps its relative order.

use std::sync::Arc;

use vellum_core::{Element, ElementId, Sequence};

/// Where a remote element asks to be placed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentHint {
    /// Front of the sequence
    First,
    /// Immediately after the named element
    After(ElementId),
}

/// One entry of a remote batch: an element plus its optional order hint.
/// Ephemeral; supplied by transport and discarded after the merge.
#[derive(Clone, Debug)]
pub struct RemoteElement {
    pub element: Arc<Element>,
    pub parent: Option<ParentHint>,
}

impl RemoteElement {
    pub fn new(element: Arc<Element>) -> Self {
        RemoteElement {
            element,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: ParentHint) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Counters describing one merge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Ids where the local copy won content resolution
    pub kept_local: u32,
    /// Ids where the remote copy won content resolution
    pub took_remote: u32,
    /// Ids only the remote batch knew
    pub added: u32,
    /// Elements moved to honor a parent hint
    pub moved: u32,
}

/// Result of one merge
#[derive(Clone, Debug)]
pub struct ReconcileResult {
    pub elements: Sequence,
    pub stats: ReconcileStats,
}

/// Does the remote copy win content resolution for an id both sides know?
///
/// Strictly higher version wins. On a version tie the smaller nonce wins;
/// both replicas see the same two (version, nonce) pairs, so the outcome
/// is identical on each side and merging commutes. An identical
/// version+nonce pair is the same committed edit: keep local, which makes
/// re-merging idempotent.
///
/// Convergence depends on every replica using exactly this comparison.
#[inline]
pub fn remote_wins(local: &Element, remote: &Element) -> bool {
    match remote.version.cmp(&local.version) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => remote.version_nonce < local.version_nonce,
    }
}

/// Merge a local sequence with a remote batch.
///
/// Un-hinted remote elements replace their local copy in place, or append
/// when unknown. Hinted elements splice immediately after their parent
/// (or at the front for [`ParentHint::First`]); a contiguous hinted run
/// chains internally so the batch's relative order survives, and position
/// ties resolve by batch appearance order. Pure: inputs are never
/// mutated.
pub fn reconcile(local: &[Arc<Element>], remote: &[RemoteElement]) -> ReconcileResult {
    let mut merged: Sequence = Vec::with_capacity(local.len() + remote.len());
    for element in local {
        // Defensive dedup; a well-formed sequence has unique ids
        if position_of(&merged, element.id).is_none() {
            merged.push(element.clone());
        }
    }

    let mut stats = ReconcileStats::default();
    // End of the current contiguous hinted run, if any
    let mut last_placed: Option<ElementId> = None;

    for record in remote {
        let id = record.element.id;
        let existing = position_of(&merged, id);

        let winner: Arc<Element> = match existing {
            Some(position) => {
                if remote_wins(&merged[position], &record.element) {
                    stats.took_remote += 1;
                    record.element.clone()
                } else {
                    tracing::debug!("discarding remote {}: local copy wins", id);
                    stats.kept_local += 1;
                    merged[position].clone()
                }
            }
            None => {
                stats.added += 1;
                record.element.clone()
            }
        };

        match record.parent {
            None => {
                last_placed = None;
                match existing {
                    Some(position) => merged[position] = winner,
                    None => merged.push(winner),
                }
            }
            Some(hint) => {
                if let Some(position) = existing {
                    merged.remove(position);
                    stats.moved += 1;
                }

                let anchor = match hint {
                    ParentHint::First => 0,
                    ParentHint::After(parent_id) => match position_of(&merged, parent_id) {
                        Some(position) => position + 1,
                        // Unknown parent: fall back to the end
                        None => merged.len(),
                    },
                };
                // Chain within the hinted run: never land at or before the
                // previously placed element of this batch
                let floor = last_placed
                    .and_then(|placed| position_of(&merged, placed))
                    .map(|position| position + 1)
                    .unwrap_or(0);
                let position = anchor.max(floor).min(merged.len());

                merged.insert(position, winner);
                last_placed = Some(id);
            }
        }
    }

    ReconcileResult {
        elements: merged,
        stats,
    }
}

fn position_of(sequence: &[Arc<Element>], id: ElementId) -> Option<usize> {
    sequence.iter().position(|element| element.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::ShapeKind;

    fn element(id: u64, version: u64, nonce: u64) -> Arc<Element> {
        Arc::new(
            Element::new(ElementId::new(id), ShapeKind::Rectangle)
                .with_version(version)
                .with_version_nonce(nonce),
        )
    }

    fn ids(sequence: &[Arc<Element>]) -> Vec<u64> {
        sequence.iter().map(|element| element.id.0).collect()
    }

    #[test]
    fn test_remote_higher_version_wins_in_place() {
        let local = vec![element(1, 1, 0), element(2, 1, 0), element(3, 1, 0)];
        let remote = vec![RemoteElement::new(element(2, 2, 0))];

        let result = reconcile(&local, &remote);
        assert_eq!(ids(&result.elements), vec![1, 2, 3]);
        assert_eq!(result.elements[1].version, 2);
        assert_eq!(result.stats.took_remote, 1);
    }

    #[test]
    fn test_local_higher_version_discards_remote() {
        let local = vec![element(1, 3, 0)];
        let remote = vec![RemoteElement::new(element(1, 2, 0))];

        let result = reconcile(&local, &remote);
        assert_eq!(result.elements[0].version, 3);
        assert_eq!(result.stats.kept_local, 1);
    }

    #[test]
    fn test_version_tie_breaks_by_smaller_nonce() {
        let local = vec![element(1, 2, 50)];
        let remote = vec![RemoteElement::new(element(1, 2, 10))];

        let result = reconcile(&local, &remote);
        assert_eq!(result.elements[0].version_nonce, 10);

        // The mirrored merge picks the same winner
        let mirrored = reconcile(
            &[element(1, 2, 10)],
            &[RemoteElement::new(element(1, 2, 50))],
        );
        assert_eq!(mirrored.elements[0].version_nonce, 10);
    }

    #[test]
    fn test_unknown_unhinted_remote_appends() {
        let local = vec![element(1, 1, 0)];
        let remote = vec![RemoteElement::new(element(9, 1, 0))];

        let result = reconcile(&local, &remote);
        assert_eq!(ids(&result.elements), vec![1, 9]);
        assert_eq!(result.stats.added, 1);
    }

    #[test]
    fn test_hinted_batch_splices_and_chains() {
        // Local [A,B,C]; remote inserts X at front, Y after A, Z after B
        let local = vec![element(0xA, 1, 0), element(0xB, 1, 0), element(0xC, 1, 0)];
        let remote = vec![
            RemoteElement::new(element(0x10, 1, 0)).with_parent(ParentHint::First),
            RemoteElement::new(element(0x11, 1, 0))
                .with_parent(ParentHint::After(ElementId::new(0xA))),
            RemoteElement::new(element(0x12, 1, 0))
                .with_parent(ParentHint::After(ElementId::new(0xB))),
        ];

        let result = reconcile(&local, &remote);
        assert_eq!(ids(&result.elements), vec![0x10, 0xA, 0x11, 0xB, 0x12, 0xC]);
    }

    #[test]
    fn test_same_parent_keeps_batch_order() {
        let local = vec![element(0xA, 1, 0), element(0xB, 1, 0)];
        let remote = vec![
            RemoteElement::new(element(1, 1, 0))
                .with_parent(ParentHint::After(ElementId::new(0xA))),
            RemoteElement::new(element(2, 1, 0))
                .with_parent(ParentHint::After(ElementId::new(0xA))),
        ];

        let result = reconcile(&local, &remote);
        assert_eq!(ids(&result.elements), vec![0xA, 1, 2, 0xB]);
    }

    #[test]
    fn test_unknown_parent_appends() {
        let local = vec![element(1, 1, 0)];
        let remote = vec![RemoteElement::new(element(2, 1, 0))
            .with_parent(ParentHint::After(ElementId::new(0xFF)))];

        let result = reconcile(&local, &remote);
        assert_eq!(ids(&result.elements), vec![1, 2]);
    }

    #[test]
    fn test_re_reconciliation_is_stable() {
        let local = vec![element(1, 2, 7), element(2, 1, 0), element(3, 1, 0)];
        let remote = vec![
            RemoteElement::new(element(2, 2, 0)),
            RemoteElement::new(element(9, 1, 0))
                .with_parent(ParentHint::After(ElementId::new(1))),
        ];

        let first = reconcile(&local, &remote);

        // Relabeled copy of the original local input: fresh handles,
        // same content
        let relabeled: Vec<RemoteElement> = local
            .iter()
            .map(|element| RemoteElement::new(Arc::new(element.as_ref().clone())))
            .collect();
        let second = reconcile(&first.elements, &relabeled);

        assert_eq!(ids(&second.elements), ids(&first.elements));
        for (a, b) in second.elements.iter().zip(first.elements.iter()) {
            assert_eq!(a.version, b.version);
            assert_eq!(a.version_nonce, b.version_nonce);
        }
    }
}

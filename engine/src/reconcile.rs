//! Reconciliation - merging a remote batch into the local scene.
//!
//! This is the core of convergence. Given the local element set and a batch
//! received from a peer (possibly a strict subset of that peer's scene), this
//! module produces one merged scene, deterministically.
//!
//! # Algorithm
//!
//! Per remote element `r` against the local element `l` with the same id:
//!
//! 1. id under an active local edit: keep `l`, discard `r`
//! 2. no local element: adopt `r`
//! 3. `l.version > r.version`: keep `l`
//! 4. versions equal, nonces differ: lower nonce wins
//! 5. otherwise (`r` newer, or version and nonce both equal): adopt `r`
//!
//! Locals absent from the batch are carried forward unchanged - a diffed
//! batch never causes silent loss. The tiebreak (rule 4) is arbitrary but
//! peer-symmetric; every peer applying the same total order over nonces is
//! the property that makes concurrent edits converge. Changing it is a
//! protocol-version concern, not a local tweak.

use crate::element::Element;
use crate::ElementId;
use std::collections::{HashMap, HashSet};

/// Merge a remote batch into the local scene.
///
/// `locked` names element ids currently under an in-progress local edit
/// (drag, resize); those are never overwritten by this pass and will be
/// reconsidered on a later batch once the edit commits.
///
/// Output order: resolved elements in remote-batch order, then untouched
/// local-only elements in local order. The result holds at most one element
/// per id and is suitable for [`SceneStore::replace_all`].
///
/// Merging is idempotent and insensitive to batch order and duplication:
/// peers that have seen the same cumulative set of updates end up with the
/// same per-id `(version, nonce, payload, deleted)` state.
///
/// [`SceneStore::replace_all`]: crate::scene::SceneStore::replace_all
pub fn reconcile(
    local: &[Element],
    remote: &[Element],
    locked: &HashSet<ElementId>,
) -> Vec<Element> {
    let mut local_by_id: HashMap<&str, &Element> =
        local.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut merged: Vec<Element> = Vec::with_capacity(local.len() + remote.len());
    let mut merged_slots: HashMap<ElementId, usize> = HashMap::new();

    for incoming in remote {
        if locked.contains(&incoming.id) {
            // the in-progress local copy is carried forward below
            continue;
        }

        // a duplicated id within one batch re-resolves against the winner
        // already placed, preserving the one-element-per-id invariant
        if let Some(&slot) = merged_slots.get(&incoming.id) {
            if remote_wins(&merged[slot], incoming) {
                merged[slot] = incoming.clone();
            }
            continue;
        }

        let winner = match local_by_id.remove(incoming.id.as_str()) {
            Some(ours) if !remote_wins(ours, incoming) => ours.clone(),
            _ => incoming.clone(),
        };
        merged_slots.insert(winner.id.clone(), merged.len());
        merged.push(winner);
    }

    // carry forward locals the sender simply didn't include
    for ours in local {
        if local_by_id.contains_key(ours.id.as_str()) {
            merged.push(ours.clone());
        }
    }

    merged
}

/// Decide whether the remote copy replaces ours (rules 3-5).
fn remote_wins(ours: &Element, theirs: &Element) -> bool {
    if ours.version != theirs.version {
        return theirs.version > ours.version;
    }
    if ours.version_nonce != theirs.version_nonce {
        return theirs.version_nonce < ours.version_nonce;
    }
    // same version, same nonce: the copies are interchangeable
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn element(id: &str, version: u64, nonce: u64, label: &str) -> Element {
        Element {
            id: id.to_string(),
            version,
            version_nonce: nonce,
            is_deleted: false,
            payload: json!({ "label": label }),
        }
    }

    fn no_locks() -> HashSet<ElementId> {
        HashSet::new()
    }

    fn by_id(elements: &[Element]) -> HashMap<&str, &Element> {
        elements.iter().map(|e| (e.id.as_str(), e)).collect()
    }

    #[test]
    fn adopt_unknown_remote() {
        let local = vec![];
        let remote = vec![element("a", 1, 10, "remote")];

        let merged = reconcile(&local, &remote, &no_locks());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].payload["label"], "remote");
    }

    #[test]
    fn local_precedence_by_version() {
        let local = vec![element("a", 5, 10, "ours")];
        let remote = vec![element("a", 3, 99, "stale")];

        let merged = reconcile(&local, &remote, &no_locks());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].version, 5);
        assert_eq!(merged[0].payload["label"], "ours");
    }

    #[test]
    fn remote_precedence_by_version() {
        let local = vec![element("a", 2, 10, "ours")];
        let remote = vec![element("a", 4, 99, "theirs")];

        let merged = reconcile(&local, &remote, &no_locks());

        assert_eq!(merged[0].version, 4);
        assert_eq!(merged[0].payload["label"], "theirs");
    }

    #[test]
    fn equal_version_lower_nonce_wins() {
        let local = vec![element("a", 4, 10, "ours")];
        let remote = vec![element("a", 4, 20, "theirs")];

        let merged = reconcile(&local, &remote, &no_locks());
        assert_eq!(merged[0].version_nonce, 10);

        // and symmetrically when the remote nonce is lower
        let local = vec![element("a", 4, 20, "ours")];
        let remote = vec![element("a", 4, 10, "theirs")];

        let merged = reconcile(&local, &remote, &no_locks());
        assert_eq!(merged[0].version_nonce, 10);
        assert_eq!(merged[0].payload["label"], "theirs");
    }

    #[test]
    fn equal_version_equal_nonce_adopts_remote() {
        let local = vec![element("a", 4, 10, "ours")];
        let remote = vec![element("a", 4, 10, "theirs")];

        let merged = reconcile(&local, &remote, &no_locks());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].payload["label"], "theirs");
    }

    #[test]
    fn locked_element_never_overwritten() {
        let local = vec![element("a", 1, 10, "mid-drag")];
        let remote = vec![element("a", 9, 5, "theirs")];
        let locked: HashSet<ElementId> = ["a".to_string()].into_iter().collect();

        let merged = reconcile(&local, &remote, &locked);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].payload["label"], "mid-drag");
        assert_eq!(merged[0].version, 1);
    }

    #[test]
    fn no_silent_loss_of_local_only_elements() {
        let local = vec![element("z", 1, 10, "only-here")];
        let remote = vec![
            element("a", 1, 1, "r"),
            element("b", 1, 2, "r"),
            element("c", 1, 3, "r"),
        ];

        let merged = reconcile(&local, &remote, &no_locks());

        assert_eq!(merged.len(), 4);
        assert!(merged.iter().any(|e| e.id == "z"));
    }

    #[test]
    fn output_order_is_remote_then_local() {
        let local = vec![element("x", 1, 1, "l"), element("y", 1, 2, "l")];
        let remote = vec![element("b", 1, 3, "r"), element("a", 1, 4, "r")];

        let merged = reconcile(&local, &remote, &no_locks());

        let ids: Vec<_> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "x", "y"]);
    }

    #[test]
    fn tombstone_propagates() {
        let local = vec![element("a", 1, 10, "alive")];
        let mut deleted = element("a", 2, 5, "gone");
        deleted.is_deleted = true;
        let remote = vec![deleted];

        let merged = reconcile(&local, &remote, &no_locks());

        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_deleted);
    }

    #[test]
    fn remerge_is_a_no_op() {
        let local = vec![element("a", 2, 10, "ours"), element("z", 1, 3, "local")];
        let remote = vec![element("a", 2, 20, "theirs"), element("b", 1, 4, "new")];

        let once = reconcile(&local, &remote, &no_locks());
        let twice = reconcile(&once, &remote, &no_locks());

        assert_eq!(by_id(&once), by_id(&twice));
    }

    #[test]
    fn duplicate_ids_within_batch_resolve_to_one() {
        let local = vec![];
        let remote = vec![
            element("a", 1, 10, "older"),
            element("a", 3, 20, "newer"),
            element("a", 2, 30, "middle"),
        ];

        let merged = reconcile(&local, &remote, &no_locks());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].version, 3);
        assert_eq!(merged[0].payload["label"], "newer");
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        prop_compose! {
            fn arb_element()(
                id in 0usize..6,
                version in 1u64..6,
                nonce in 0u64..50,
                is_deleted in any::<bool>(),
            ) -> Element {
                Element {
                    id: format!("el-{}", id),
                    version,
                    version_nonce: nonce,
                    is_deleted,
                    payload: json!({ "v": version, "n": nonce }),
                }
            }
        }

        fn arb_batch() -> impl Strategy<Value = Vec<Element>> {
            proptest::collection::vec(arb_element(), 0..8)
        }

        fn snapshot(elements: &[Element]) -> HashMap<String, (u64, u64, bool)> {
            elements
                .iter()
                .map(|e| (e.id.clone(), (e.version, e.version_nonce, e.is_deleted)))
                .collect()
        }

        proptest! {
            #[test]
            fn merge_is_idempotent(local in arb_batch(), remote in arb_batch()) {
                let once = reconcile(&local, &remote, &no_locks());
                let twice = reconcile(&once, &remote, &no_locks());

                prop_assert_eq!(snapshot(&once), snapshot(&twice));
            }

            #[test]
            fn merge_order_does_not_matter(
                a in arb_batch(),
                b in arb_batch(),
            ) {
                // two peers with empty scenes receive the same two batches in
                // opposite orders
                let ab = reconcile(&reconcile(&[], &a, &no_locks()), &b, &no_locks());
                let ba = reconcile(&reconcile(&[], &b, &no_locks()), &a, &no_locks());

                prop_assert_eq!(snapshot(&ab), snapshot(&ba));
            }

            #[test]
            fn duplication_does_not_matter(a in arb_batch(), b in arb_batch()) {
                let base = reconcile(&reconcile(&[], &a, &no_locks()), &b, &no_locks());
                let with_dup = reconcile(
                    &reconcile(&reconcile(&[], &a, &no_locks()), &b, &no_locks()),
                    &a,
                    &no_locks(),
                );

                prop_assert_eq!(snapshot(&base), snapshot(&with_dup));
            }

            #[test]
            fn no_element_vanishes(local in arb_batch(), remote in arb_batch()) {
                // dedupe local ids first: scenes hold one element per id
                let local = reconcile(&[], &local, &no_locks());
                let merged = reconcile(&local, &remote, &no_locks());

                let merged_ids: HashSet<_> =
                    merged.iter().map(|e| e.id.clone()).collect();
                for ours in &local {
                    prop_assert!(merged_ids.contains(&ours.id));
                }
                for theirs in &remote {
                    prop_assert!(merged_ids.contains(&theirs.id));
                }
            }
        }
    }
}

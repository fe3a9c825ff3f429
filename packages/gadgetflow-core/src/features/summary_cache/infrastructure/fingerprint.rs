//! Structural summary fingerprint
//!
//! Hashes the part of a summary graph reachable from its roots, with
//! entities numbered in breadth-first order so that two graphs built by
//! separate runs of the same code hash equally. Used to detect the
//! fixpoint of a recursion loop.

use crate::features::summary_cache::domain::Summary;
use crate::features::symbolic_graph::{EntityId, TaintId};
use ahash::RandomState;
use rustc_hash::FxHashMap;
use std::hash::{BuildHasher, Hash, Hasher};

// Fixed seeds: fingerprints are compared across iterations of one run
const SEEDS: (u64, u64, u64, u64) = (
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// `canonical` maps raw taint ids to their current identity (ids may have
/// been re-identified since the graph was built)
pub fn summary_fingerprint<F>(summary: &Summary, canonical: F) -> u64
where
    F: Fn(TaintId) -> TaintId,
{
    let state = RandomState::with_seeds(SEEDS.0, SEEDS.1, SEEDS.2, SEEDS.3);
    let mut hasher = state.build_hasher();

    let Some(summary) = summary.as_computed() else {
        0u8.hash(&mut hasher);
        return hasher.finish();
    };
    1u8.hash(&mut hasher);

    let graph = &summary.graph;
    let roots = summary.roots();
    let present: Vec<EntityId> = roots.iter().flatten().copied().collect();
    let order = graph.reachable_from(&present);
    let numbering: FxHashMap<EntityId, usize> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    for root in &roots {
        root.map(|r| numbering.get(&graph.find(r)).copied())
            .hash(&mut hasher);
    }

    for id in &order {
        let entity = graph.entity(*id);
        canonical(entity.taint()).0.hash(&mut hasher);
        entity.is_deep_input().hash(&mut hasher);

        for (key, child) in entity.sorted_fields() {
            key.as_str().hash(&mut hasher);
            numbering.get(&graph.find(child)).hash(&mut hasher);
        }

        let mut targets: Vec<&str> = entity
            .target_calls()
            .iter()
            .map(|c| c.signature.as_str())
            .collect();
        targets.sort_unstable();
        targets.hash(&mut hasher);

        entity.possible_input().count().hash(&mut hasher);
        entity.possible_tainted().len().hash(&mut hasher);
    }

    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::execution_env::ExecutionContext;
    use crate::shared::models::{CallStack, FieldKey, MethodRef, TypeRef};

    fn summary(taint: Option<TaintId>) -> Summary {
        let m = MethodRef::new(
            TypeRef::new("Test.A"),
            "M",
            vec![TypeRef::object()],
            TypeRef::void(),
            false,
        );
        let mut ctx = ExecutionContext::new(&m, &[], false);
        let formal = ctx.arguments.formal(0).unwrap();
        let child = ctx.graph.load_field(formal, FieldKey::new("Test.A::f"));
        if let Some(t) = taint {
            ctx.graph.raise_taint(child, t, None);
        }
        Summary::from_frozen(ctx.freeze(), CallStack::new())
    }

    #[test]
    fn test_equal_structure_equal_fingerprint() {
        let a = summary_fingerprint(&summary(Some(TaintId(2))), |t| t);
        let b = summary_fingerprint(&summary(Some(TaintId(2))), |t| t);
        assert_eq!(a, b);
    }

    #[test]
    fn test_taint_changes_fingerprint() {
        let clean = summary_fingerprint(&summary(None), |t| t);
        let tainted = summary_fingerprint(&summary(Some(TaintId(2))), |t| t);
        assert_ne!(clean, tainted);
        assert_ne!(clean, summary_fingerprint(&Summary::Empty, |t| t));
    }

    #[test]
    fn test_canonical_ids() {
        let old = summary_fingerprint(&summary(Some(TaintId(2))), |t| {
            if t == TaintId(2) {
                TaintId(5)
            } else {
                t
            }
        });
        let new = summary_fingerprint(&summary(Some(TaintId(5))), |t| t);
        assert_eq!(old, new);
    }
}

//! Quasi-destructive graph unification over a [`NodeStore`].
//!
//! Nothing is ever overwritten: a node unified into another gains a forward
//! reference and keeps the partner's extra arcs in its complement list. Every
//! forward assignment is stamped with a fresh generation for the node's owner.
//!
//! The engine is not transactional. If a recursive shared-arc unification
//! fails, sub-unifications that already completed stay in the store and the
//! error from the innermost failure is returned.

use std::collections::HashSet;

use serde::Serialize;

use crate::dereference::{dereference, forward_chain};
use crate::error::{Error, Result};
use crate::materialize::copy_with_comp_arcs;
use crate::node::{Arc, DGNode, NodeId, NodeUpdate, complement_arcs, find_arc, intersect_arcs};
use crate::store::NodeStore;

/// One forward reference written during a unification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Forwarding {
    pub node: NodeId,
    pub into: NodeId,
    pub generation: u64,
    pub comp_arcs_added: usize,
}

/// Outcome of [`Unifier::unify`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnifiedResult {
    /// Node surfaced to callers as the result of the unification.
    pub result_node_id: NodeId,
    /// Canonical node of the first input after unification.
    pub canonical_id: NodeId,
    /// Forward references written by this call, innermost first.
    pub forwarded: Vec<Forwarding>,
}

impl UnifiedResult {
    pub fn merged(&self) -> bool {
        !self.forwarded.is_empty()
    }
}

/// State threaded through one top-level call.
#[derive(Default)]
struct Session {
    /// Canonical pairs whose shared arcs are being unified. Re-entering one
    /// succeeds immediately so cyclic structures terminate.
    in_progress: HashSet<(NodeId, NodeId)>,
    forwarded: Vec<Forwarding>,
}

pub struct Unifier<'s, S: NodeStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: NodeStore + ?Sized> Unifier<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Canonical node for `id`.
    pub fn dereference(&self, id: NodeId) -> Result<DGNode> {
        dereference(self.store, id)
    }

    /// Forward chain from `id` to its canonical node.
    pub fn forward_chain(&self, id: NodeId) -> Result<Vec<DGNode>> {
        forward_chain(self.store, id)
    }

    /// Materialize `id` with its accumulated structure as a new node.
    pub fn copy_with_comp_arcs(&self, id: NodeId) -> Result<DGNode> {
        copy_with_comp_arcs(self.store, id)
    }

    /// Unify two nodes and materialize the result.
    ///
    /// When the call changes nothing (already the same canonical node, or two
    /// equal leaves) nothing is written: the first input's existing copy is
    /// returned if it has one, otherwise its canonical node.
    pub fn unify(&self, id1: NodeId, id2: NodeId) -> Result<UnifiedResult> {
        let forwarded = self.unify_core(id1, id2)?;
        let canonical = self.dereference(id1)?;

        let result_node_id = if forwarded.is_empty() {
            self.existing_copy(id1)?.unwrap_or(canonical.id)
        } else {
            self.copy_with_comp_arcs(id1)?.id
        };

        Ok(UnifiedResult {
            result_node_id,
            canonical_id: canonical.id,
            forwarded,
        })
    }

    /// Unify without materializing. Returns the forward references written.
    pub fn unify_core(&self, id1: NodeId, id2: NodeId) -> Result<Vec<Forwarding>> {
        let mut session = Session::default();
        self.unify_in(id1, id2, &mut session)?;
        Ok(session.forwarded)
    }

    fn existing_copy(&self, id: NodeId) -> Result<Option<NodeId>> {
        let node = self.store.require(id)?;
        match node.copy_id {
            Some(copy) if self.store.get(copy)?.is_some() => Ok(Some(copy)),
            _ => Ok(None),
        }
    }

    fn unify_in(&self, id1: NodeId, id2: NodeId, session: &mut Session) -> Result<()> {
        let n1 = self.dereference(id1)?;
        let n2 = self.dereference(id2)?;
        tracing::debug!(%id1, %id2, canonical1 = %n1.id, canonical2 = %n2.id, "unify");

        if n1.id == n2.id {
            return Ok(());
        }
        if session.in_progress.contains(&(n1.id, n2.id)) {
            tracing::debug!(canonical1 = %n1.id, canonical2 = %n2.id, "pair already in progress");
            return Ok(());
        }

        match (n1.is_leaf(), n2.is_leaf()) {
            (true, true) => {
                if n1.name == n2.name {
                    Ok(())
                } else {
                    Err(Error::IncompatibleLeaves {
                        left: n1.display_name().to_string(),
                        right: n2.display_name().to_string(),
                    })
                }
            }
            (true, false) => self.forward(&n1, n2.id, Vec::new(), session),
            (false, true) => self.forward(&n2, n1.id, Vec::new(), session),
            (false, false) => self.unify_complex(n1, n2, session),
        }
    }

    fn unify_complex(&self, n1: DGNode, n2: DGNode, session: &mut Session) -> Result<()> {
        let shared = intersect_arcs(&n1.arc_list, &n2.arc_list);
        if shared.is_empty() {
            let complement = complement_arcs(&n2.arc_list, &n1.arc_list);
            return self.forward(&n1, n2.id, complement, session);
        }

        session.in_progress.insert((n1.id, n2.id));
        for theirs in &shared {
            let Some(ours) = find_arc(&theirs.label, &n1.arc_list) else {
                continue;
            };
            match (ours.value.as_node(), theirs.value.as_node()) {
                (Some(a), Some(b)) => {
                    tracing::debug!(label = %theirs.label, %a, %b, "unifying shared arc");
                    self.unify_in(a, b, session)?;
                }
                _ => {
                    tracing::debug!(label = %theirs.label, "shared scalar arc, no recursion");
                }
            }
        }

        // Shared substructure may have merged either side while recursing.
        let fresh1 = self.store.require(n1.id)?;
        let fresh2 = self.store.require(n2.id)?;
        if fresh1.is_superseded() || fresh2.is_superseded() {
            tracing::debug!(canonical1 = %n1.id, canonical2 = %n2.id, "merged during recursion, restarting");
            return self.unify_in(fresh1.id, fresh2.id, session);
        }

        let complement = complement_arcs(&fresh2.arc_list, &fresh1.arc_list);
        self.forward(&fresh1, fresh2.id, complement, session)
    }

    /// Point `node` at `into`, appending `complement` to its complement arcs.
    fn forward(
        &self,
        node: &DGNode,
        into: NodeId,
        complement: Vec<Arc>,
        session: &mut Session,
    ) -> Result<()> {
        debug_assert!(node.forward_id.is_none(), "only canonical nodes are forwarded");

        let generation = self.store.next_generation(&node.owner)?;
        let comp_arcs_added = complement.len();
        let comp_arc_list = (!complement.is_empty()).then(|| {
            let mut arcs = node.comp_arc_list.clone();
            arcs.extend(complement);
            arcs
        });

        self.store.update(
            node.id,
            &NodeUpdate {
                comp_arc_list,
                forward_id: Some(into),
                generation: Some(generation),
                ..Default::default()
            },
        )?;

        tracing::info!(node = %node.id, %into, generation, comp_arcs_added, "forwarded");
        session.forwarded.push(Forwarding {
            node: node.id,
            into,
            generation,
            comp_arcs_added,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GENERATION_SEED;
    use crate::node::ArcValue;
    use crate::store::MemoryStore;

    fn labels(node: &DGNode) -> Vec<&str> {
        node.arc_list.iter().map(|a| a.label.as_str()).collect()
    }

    fn leaf(store: &MemoryStore, name: &str) -> NodeId {
        store.create(DGNode::leaf("o", name)).unwrap()
    }

    fn complex(store: &MemoryStore, arcs: Vec<Arc>) -> NodeId {
        store.create(DGNode::complex("o", arcs)).unwrap()
    }

    #[test]
    fn test_same_node_is_noop() {
        let store = MemoryStore::new();
        let a = complex(&store, vec![Arc::text("k", "v")]);
        let unifier = Unifier::new(&store);

        let result = unifier.unify(a, a).unwrap();
        assert!(!result.merged());
        assert_eq!(result.result_node_id, a);
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn test_equal_leaves_unify_without_mutation() {
        let store = MemoryStore::new();
        let x1 = leaf(&store, "X");
        let x2 = leaf(&store, "X");
        let before = store.all_nodes().unwrap().len();

        let result = Unifier::new(&store).unify(x1, x2).unwrap();
        assert!(!result.merged());
        assert_eq!(store.all_nodes().unwrap().len(), before);
        assert!(store.require(x1).unwrap().forward_id.is_none());
        assert!(store.require(x1).unwrap().copy_id.is_none());
        assert!(store.require(x2).unwrap().forward_id.is_none());
    }

    #[test]
    fn test_different_leaves_fail() {
        let store = MemoryStore::new();
        let x = leaf(&store, "X");
        let y = leaf(&store, "Y");

        let err = Unifier::new(&store).unify(x, y).unwrap_err();
        match err {
            Error::IncompatibleLeaves { left, right } => {
                assert_eq!(left, "X");
                assert_eq!(right, "Y");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.require(x).unwrap().forward_id.is_none());
    }

    #[test]
    fn test_leaf_forwards_into_complex_either_side() {
        let store = MemoryStore::new();
        let l1 = leaf(&store, "L1");
        let c1 = complex(&store, vec![Arc::text("k", "v")]);
        let forwarded = Unifier::new(&store).unify_core(l1, c1).unwrap();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].node, l1);
        assert_eq!(store.require(l1).unwrap().forward_id, Some(c1));
        assert_eq!(store.require(l1).unwrap().generation, GENERATION_SEED + 1);

        let c2 = complex(&store, vec![Arc::text("k", "v")]);
        let l2 = leaf(&store, "L2");
        Unifier::new(&store).unify_core(c2, l2).unwrap();
        assert_eq!(store.require(l2).unwrap().forward_id, Some(c2));
        assert!(store.require(c2).unwrap().forward_id.is_none());
    }

    #[test]
    fn test_disjoint_complex_union() {
        let store = MemoryStore::new();
        let a = complex(&store, vec![Arc::text("A", "a")]);
        let b = complex(&store, vec![Arc::text("B", "b")]);

        let result = Unifier::new(&store).unify(a, b).unwrap();
        assert!(result.merged());
        assert_eq!(result.canonical_id, b);

        let a_node = store.require(a).unwrap();
        assert_eq!(a_node.forward_id, Some(b));
        assert_eq!(a_node.comp_arc_list, vec![Arc::text("B", "b")]);

        let copy = store.require(result.result_node_id).unwrap();
        assert_eq!(labels(&copy), vec!["A", "B"]);
        assert_eq!(a_node.copy_id, Some(copy.id));
    }

    #[test]
    fn test_shared_equal_leaves_need_no_forward() {
        let store = MemoryStore::new();
        let x1 = leaf(&store, "X");
        let x2 = leaf(&store, "X");
        let c1 = complex(&store, vec![Arc::node("L", x1), Arc::text("only1", "1")]);
        let c2 = complex(&store, vec![Arc::node("L", x2), Arc::text("only2", "2")]);

        let result = Unifier::new(&store).unify(c1, c2).unwrap();
        // Equal leaves need no forward; the outer pair does.
        assert_eq!(result.forwarded.len(), 1);
        assert!(store.require(x1).unwrap().forward_id.is_none());
        assert!(store.require(x2).unwrap().forward_id.is_none());
        let c1_node = store.require(c1).unwrap();
        assert_eq!(c1_node.forward_id, Some(c2));
        assert_eq!(c1_node.comp_arc_list, vec![Arc::text("only2", "2")]);
        assert_eq!(
            labels(&store.require(result.result_node_id).unwrap()),
            vec!["L", "only1", "only2"]
        );
    }

    #[test]
    fn test_shared_arc_recursion_into_leaf_and_complex() {
        let store = MemoryStore::new();
        let inner_leaf = leaf(&store, "X");
        let inner_complex = complex(&store, vec![Arc::text("detail", "d")]);
        let c1 = complex(&store, vec![Arc::node("L", inner_leaf)]);
        let c2 = complex(&store, vec![Arc::node("L", inner_complex)]);

        let result = Unifier::new(&store).unify(c1, c2).unwrap();
        assert_eq!(result.forwarded.len(), 2);
        // Innermost first.
        assert_eq!(result.forwarded[0].node, inner_leaf);
        assert_eq!(store.require(inner_leaf).unwrap().forward_id, Some(inner_complex));
        assert_eq!(store.require(c1).unwrap().forward_id, Some(c2));
        assert!(result.forwarded[0].generation < result.forwarded[1].generation);
    }

    #[test]
    fn test_idempotent_second_call() {
        let store = MemoryStore::new();
        let a = complex(&store, vec![Arc::text("A", "a")]);
        let b = complex(&store, vec![Arc::text("B", "b")]);
        let unifier = Unifier::new(&store);

        let first = unifier.unify(a, b).unwrap();
        let snapshot = {
            let mut nodes = store.all_nodes().unwrap();
            nodes.sort_by_key(|n| n.id);
            nodes
        };

        let second = unifier.unify(a, b).unwrap();
        assert!(!second.merged());
        assert_eq!(second.result_node_id, first.result_node_id);

        let mut after = store.all_nodes().unwrap();
        after.sort_by_key(|n| n.id);
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_deep_failure_keeps_completed_siblings() {
        let store = MemoryStore::new();
        let guest = leaf(&store, "guest");
        let host = complex(&store, vec![Arc::text("h", "h")]);
        let red = leaf(&store, "red");
        let blue = leaf(&store, "blue");
        let p = complex(&store, vec![Arc::node("a", guest), Arc::node("b", red)]);
        let q = complex(&store, vec![Arc::node("a", host), Arc::node("b", blue)]);

        let err = Unifier::new(&store).unify(p, q).unwrap_err();
        assert!(matches!(err, Error::IncompatibleLeaves { .. }));
        // The sibling under "a" completed before "b" failed and is not rolled back.
        assert_eq!(store.require(guest).unwrap().forward_id, Some(host));
        assert!(store.require(p).unwrap().forward_id.is_none());
    }

    #[test]
    fn test_self_referential_structures_terminate() {
        let store = MemoryStore::new();
        let mut n1 = DGNode::complex("o", vec![Arc::text("k", "1")]);
        n1.arc_list.push(Arc::node("self", n1.id));
        let mut n2 = DGNode::complex("o", vec![Arc::text("j", "2")]);
        n2.arc_list.push(Arc::node("self", n2.id));
        let (id1, id2) = (n1.id, n2.id);
        store.create(n1).unwrap();
        store.create(n2).unwrap();

        let result = Unifier::new(&store).unify(id1, id2).unwrap();
        assert_eq!(result.forwarded.len(), 1);
        assert_eq!(store.require(id1).unwrap().forward_id, Some(id2));
        assert_eq!(
            labels(&store.require(result.result_node_id).unwrap()),
            vec!["k", "self", "j"]
        );
    }

    #[test]
    fn test_scalar_conflict_keeps_own_value() {
        let store = MemoryStore::new();
        let a = complex(&store, vec![Arc::text("colour", "red")]);
        let b = complex(&store, vec![Arc::text("colour", "blue"), Arc::number("size", 3.0)]);

        let result = Unifier::new(&store).unify(a, b).unwrap();
        let copy = store.require(result.result_node_id).unwrap();
        assert_eq!(copy.arc_list[0].value, ArcValue::Text("red".into()));
        assert_eq!(store.require(a).unwrap().comp_arc_list, vec![Arc::number("size", 3.0)]);
    }

    #[test]
    fn test_unify_through_existing_forward() {
        let store = MemoryStore::new();
        let a = complex(&store, vec![Arc::text("A", "a")]);
        let b = complex(&store, vec![Arc::text("B", "b")]);
        let c = complex(&store, vec![Arc::text("C", "c")]);
        let unifier = Unifier::new(&store);

        unifier.unify(a, b).unwrap();
        let result = unifier.unify(a, c).unwrap();
        // a is superseded, so its canonical node b is what merges into c.
        assert_eq!(store.require(b).unwrap().forward_id, Some(c));
        assert_eq!(result.canonical_id, c);
        assert_eq!(
            labels(&store.require(result.result_node_id).unwrap()),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn test_generations_strictly_increase() {
        let store = MemoryStore::new();
        let unifier = Unifier::new(&store);
        let mut last = 0;
        for i in 0..5 {
            let a = complex(&store, vec![Arc::number(&format!("a{i}"), 1.0)]);
            let b = complex(&store, vec![Arc::number(&format!("b{i}"), 2.0)]);
            let result = unifier.unify(a, b).unwrap();
            let generation = result.forwarded[0].generation;
            assert!(generation > last);
            last = generation;
        }
    }

    #[test]
    fn test_missing_node_is_not_found() {
        let store = MemoryStore::new();
        let a = leaf(&store, "X");
        let ghost = NodeId::new();
        let err = Unifier::new(&store).unify(a, ghost).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(id) if id == ghost));
    }
}

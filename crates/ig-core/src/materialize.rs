use crate::dereference::forward_chain;
use crate::error::{Error, Result};
use crate::node::{DGNode, NodeId, NodeType, NodeUpdate, union_into};
use crate::store::NodeStore;

/// Materialize "this node plus everything it has accumulated" as a new node.
///
/// The new node's arcs are the label-union of every node on the forward chain
/// from `id` to its canonical node, each contributing its own arcs and then
/// its complement arcs. Earlier entries win, so the input's original arcs
/// survive conflicts. The input's `copy_id` is pointed at the new node; the
/// copy itself is not part of any forward chain.
pub fn copy_with_comp_arcs<S: NodeStore + ?Sized>(store: &S, id: NodeId) -> Result<DGNode> {
    let chain = forward_chain(store, id)?;
    let (input, canonical) = match (chain.first(), chain.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(Error::NodeNotFound(id)),
    };

    let mut arc_list = Vec::new();
    for node in &chain {
        union_into(&mut arc_list, &node.arc_list);
        union_into(&mut arc_list, &node.comp_arc_list);
    }

    let node_type = if canonical.is_complex() || !arc_list.is_empty() {
        NodeType::Complex
    } else {
        canonical.node_type
    };

    let copy = DGNode {
        id: NodeId::new(),
        owner: input.owner.clone(),
        node_type,
        name: canonical.name.clone().or_else(|| input.name.clone()),
        arc_list,
        comp_arc_list: Vec::new(),
        forward_id: None,
        copy_id: None,
        generation: canonical.generation,
    };

    store.create(copy.clone())?;
    store.update(
        input.id,
        &NodeUpdate {
            copy_id: Some(copy.id),
            ..Default::default()
        },
    )?;

    tracing::info!(
        input = %input.id,
        canonical = %canonical.id,
        copy = %copy.id,
        arcs = copy.arc_list.len(),
        "materialized unification result"
    );
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Arc;
    use crate::store::MemoryStore;

    #[test]
    fn test_canonical_node_copy_merges_own_comp_arcs() {
        let store = MemoryStore::new();
        let mut node = DGNode::complex("o", vec![Arc::text("a", "1")]);
        node.comp_arc_list = vec![Arc::text("b", "2"), Arc::text("a", "ignored")];
        node.generation = 14;
        let id = store.create(node).unwrap();

        let copy = copy_with_comp_arcs(&store, id).unwrap();
        assert_eq!(copy.arc_list, vec![Arc::text("a", "1"), Arc::text("b", "2")]);
        assert!(copy.comp_arc_list.is_empty());
        assert_eq!(copy.generation, 14);
        assert!(copy.forward_id.is_none());
        assert_eq!(store.require(id).unwrap().copy_id, Some(copy.id));
        assert_eq!(store.require(copy.id).unwrap(), copy);
    }

    #[test]
    fn test_forwarded_input_collects_chain() {
        let store = MemoryStore::new();
        let mut canonical = DGNode::complex("o", vec![Arc::text("b", "from-b"), Arc::text("a", "b-side")]);
        canonical.generation = 20;
        let canonical_id = store.create(canonical).unwrap();

        let mut input = DGNode::complex("o", vec![Arc::text("a", "a-side")]);
        input.comp_arc_list = vec![Arc::text("b", "from-b")];
        input.forward_id = Some(canonical_id);
        let input_id = store.create(input).unwrap();

        let copy = copy_with_comp_arcs(&store, input_id).unwrap();
        assert_eq!(
            copy.arc_list,
            vec![Arc::text("a", "a-side"), Arc::text("b", "from-b")]
        );
        assert_eq!(copy.generation, 20);
        assert_eq!(store.require(input_id).unwrap().copy_id, Some(copy.id));
        assert!(store.require(canonical_id).unwrap().copy_id.is_none());
    }

    #[test]
    fn test_plain_leaf_copy_stays_leaf() {
        let store = MemoryStore::new();
        let id = store.create(DGNode::leaf("o", "X")).unwrap();
        let copy = copy_with_comp_arcs(&store, id).unwrap();
        assert_eq!(copy.node_type, NodeType::Leaf);
        assert_eq!(copy.name.as_deref(), Some("X"));
        assert_ne!(copy.id, id);
    }

    #[test]
    fn test_leaf_forwarded_into_complex_becomes_complex() {
        let store = MemoryStore::new();
        let complex = store
            .create(DGNode::named_complex("o", "host", vec![Arc::number("n", 1.0)]))
            .unwrap();
        let mut leaf = DGNode::leaf("o", "guest");
        leaf.forward_id = Some(complex);
        let leaf_id = store.create(leaf).unwrap();

        let copy = copy_with_comp_arcs(&store, leaf_id).unwrap();
        assert_eq!(copy.node_type, NodeType::Complex);
        assert_eq!(copy.name.as_deref(), Some("host"));
        assert_eq!(copy.arc_list, vec![Arc::number("n", 1.0)]);
    }
}

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::node::{DGNode, NodeId};
use crate::store::NodeStore;

/// Every node on the forward chain starting at `id`, canonical node last.
///
/// Fails with `CycleDetected` on the first id seen twice and `NodeNotFound`
/// on a dangling link. Read-only.
pub fn forward_chain<S: NodeStore + ?Sized>(store: &S, id: NodeId) -> Result<Vec<DGNode>> {
    let mut visited = HashSet::new();
    let mut chain = Vec::new();
    let mut current = id;

    loop {
        if !visited.insert(current) {
            tracing::warn!(start = %id, repeated = %current, "forward chain cycle");
            return Err(Error::CycleDetected(current));
        }
        let node = store.require(current)?;
        let next = node.forward_id;
        chain.push(node);
        match next {
            Some(next) => current = next,
            None => return Ok(chain),
        }
    }
}

/// Resolve `id` to its canonical node: the end of its forward chain.
pub fn dereference<S: NodeStore + ?Sized>(store: &S, id: NodeId) -> Result<DGNode> {
    forward_chain(store, id)?
        .pop()
        .ok_or(Error::NodeNotFound(id))
}

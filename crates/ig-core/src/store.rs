//! The [`NodeStore`] contract the engine runs against, plus [`MemoryStore`].
//!
//! The engine never holds nodes across calls: every read goes through the
//! store, and every structural mutation is a single [`NodeStore::update`].
//! Backends decide how much atomicity they offer; the engine assumes none
//! across calls. Generation stamps are the one exception: they must come from
//! an atomic increment inside the backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::constants::GENERATION_SEED;
use crate::error::{Error, Result};
use crate::idea::Idea;
use crate::node::{Arc, DGNode, NodeId, NodeUpdate};

/// Durable keyed storage for DG nodes and the ideas that own them.
pub trait NodeStore {
    /// Snapshot of a node, or `None` if the id is unknown.
    fn get(&self, id: NodeId) -> Result<Option<DGNode>>;

    /// Persist a new node under its own id.
    fn create(&self, node: DGNode) -> Result<NodeId>;

    /// Overwrite the given fields. Fails with `NodeNotFound` if absent.
    ///
    /// A forward reference is written once: setting `forward_id` on a node
    /// that already has one fails with a retryable store error and changes
    /// nothing.
    fn update(&self, id: NodeId, update: &NodeUpdate) -> Result<()>;

    /// Atomically increment and return the owner's generation counter.
    fn next_generation(&self, owner: &str) -> Result<u64>;

    fn get_idea(&self, id: NodeId) -> Result<Option<Idea>>;

    /// Persist an idea together with its node. `node.id` must equal `idea.id`.
    fn create_idea(&self, idea: Idea, node: DGNode) -> Result<NodeId>;

    /// Non-archived ideas of an owner, in creation order.
    fn list_active(&self, owner: &str) -> Result<Vec<Idea>>;

    /// Soft-delete. The idea and its node stay readable.
    fn archive_idea(&self, id: NodeId) -> Result<()>;

    /// Like [`NodeStore::get`] but a missing node is an error.
    fn require(&self, id: NodeId) -> Result<DGNode> {
        self.get(id)?.ok_or(Error::NodeNotFound(id))
    }

    /// Author an idea: a leaf named after the title when `arcs` is empty,
    /// otherwise a complex node carrying them.
    fn author_idea(&self, idea: Idea, arcs: Vec<Arc>) -> Result<NodeId> {
        let mut node = if arcs.is_empty() {
            DGNode::leaf(&idea.owner, &idea.title)
        } else {
            DGNode::named_complex(&idea.owner, &idea.title, arcs)
        };
        node.id = idea.id;
        self.create_idea(idea, node)
    }
}

#[derive(Default)]
struct MemoryState {
    nodes: HashMap<NodeId, DGNode>,
    ideas: Vec<Idea>,
    generations: HashMap<String, u64>,
}

/// HashMap-backed store for tests and ephemeral sessions. Same semantics as
/// the SQLite backend; one mutex makes every call atomic on its own.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.inner
            .lock()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }

    pub fn node_count(&self) -> Result<usize> {
        Ok(self.state()?.nodes.len())
    }

    /// All nodes, unordered.
    pub fn all_nodes(&self) -> Result<Vec<DGNode>> {
        Ok(self.state()?.nodes.values().cloned().collect())
    }
}

impl NodeStore for MemoryStore {
    fn get(&self, id: NodeId) -> Result<Option<DGNode>> {
        Ok(self.state()?.nodes.get(&id).cloned())
    }

    fn create(&self, node: DGNode) -> Result<NodeId> {
        let mut state = self.state()?;
        let id = node.id;
        if state.nodes.contains_key(&id) {
            return Err(Error::Integrity(format!("duplicate node id {id}")));
        }
        state.nodes.insert(id, node);
        Ok(id)
    }

    fn update(&self, id: NodeId, update: &NodeUpdate) -> Result<()> {
        let mut state = self.state()?;
        let node = state.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        if update.forward_id.is_some() && node.forward_id.is_some() {
            return Err(Error::store(format!("node {id} is already forwarded")));
        }
        update.apply_to(node);
        Ok(())
    }

    fn next_generation(&self, owner: &str) -> Result<u64> {
        let mut state = self.state()?;
        let counter = state
            .generations
            .entry(owner.to_string())
            .or_insert(GENERATION_SEED);
        *counter += 1;
        Ok(*counter)
    }

    fn get_idea(&self, id: NodeId) -> Result<Option<Idea>> {
        Ok(self.state()?.ideas.iter().find(|i| i.id == id).cloned())
    }

    fn create_idea(&self, idea: Idea, node: DGNode) -> Result<NodeId> {
        if idea.id != node.id {
            return Err(Error::Integrity(format!(
                "idea {} must share its node's id {}",
                idea.id, node.id
            )));
        }
        let mut state = self.state()?;
        if state.nodes.contains_key(&node.id) {
            return Err(Error::Integrity(format!("duplicate node id {}", node.id)));
        }
        let id = idea.id;
        state.nodes.insert(id, node);
        state.ideas.push(idea);
        Ok(id)
    }

    fn list_active(&self, owner: &str) -> Result<Vec<Idea>> {
        Ok(self
            .state()?
            .ideas
            .iter()
            .filter(|i| i.owner == owner && !i.archived)
            .cloned()
            .collect())
    }

    fn archive_idea(&self, id: NodeId) -> Result<()> {
        let mut state = self.state()?;
        let idea = state
            .ideas
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(Error::NodeNotFound(id))?;
        idea.archived = true;
        Ok(())
    }
}

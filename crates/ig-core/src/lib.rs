//! Idea graph engine.
//!
//! Persistent, non-destructive graph unification in the quasi-destructive
//! style: unifying two nodes never overwrites either one. The absorbed node
//! gains a forward reference and the partner's extra arcs in its complement
//! list, and the merged view is materialized as a fresh copy. Alongside it, a
//! similarity scorer proposes which ideas are worth unifying.
//!
//! No I/O. Persistence lives behind [`NodeStore`]; [`MemoryStore`] is the
//! in-process backend.

pub mod constants;
pub mod dereference;
pub mod discover;
pub mod error;
pub mod idea;
pub mod materialize;
pub mod node;
pub mod similarity;
pub mod store;
pub mod unify;

pub use constants::{DISCOVERY_LIMIT, DISCOVERY_THRESHOLD, GENERATION_SEED};
pub use dereference::{dereference, forward_chain};
pub use discover::{DiscoveryConfig, SimilarityCandidate, discover, discover_relations};
pub use error::{BoxError, Error, Result};
pub use idea::{Idea, clamp_energy, normalize_tags};
pub use materialize::copy_with_comp_arcs;
pub use node::{Arc, ArcValue, DGNode, NodeId, NodeType, NodeUpdate};
pub use similarity::{SimilarityBreakdown, breakdown, score};
pub use store::{MemoryStore, NodeStore};
pub use unify::{Forwarding, UnifiedResult, Unifier};

//! Relation discovery: rank a pool of ideas by similarity to a target.
//!
//! Discovery is advisory. The store-backed entry point never fails; a store
//! error while loading the target or the pool yields an empty list.

use serde::{Deserialize, Serialize};

use crate::constants::{DISCOVERY_LIMIT, DISCOVERY_THRESHOLD};
use crate::idea::Idea;
use crate::node::NodeId;
use crate::similarity::score;
use crate::store::NodeStore;

/// A proposed relation to the target idea.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub id: NodeId,
    pub strength: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Candidates must score strictly above this.
    pub threshold: f64,
    /// How many candidates callers keep.
    pub limit: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            threshold: DISCOVERY_THRESHOLD,
            limit: DISCOVERY_LIMIT,
        }
    }
}

impl DiscoveryConfig {
    /// Keep the strongest `limit` candidates.
    pub fn cap(&self, mut candidates: Vec<SimilarityCandidate>) -> Vec<SimilarityCandidate> {
        candidates.truncate(self.limit);
        candidates
    }
}

/// Score `target` against every idea in `pool`, strongest first.
///
/// Skips the target itself and archived ideas. Equal strengths keep pool
/// order. Not capped; see [`DiscoveryConfig::cap`].
pub fn discover(target: &Idea, pool: &[Idea], config: &DiscoveryConfig) -> Vec<SimilarityCandidate> {
    let mut found: Vec<SimilarityCandidate> = pool
        .iter()
        .filter(|c| c.id != target.id && !c.archived)
        .map(|c| SimilarityCandidate {
            id: c.id,
            strength: score(target, c),
        })
        .filter(|c| c.strength > config.threshold)
        .collect();

    // sort_by is stable.
    found.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    found
}

/// [`discover`] over the target owner's active ideas.
pub fn discover_relations<S: NodeStore + ?Sized>(
    store: &S,
    id: NodeId,
    config: &DiscoveryConfig,
) -> Vec<SimilarityCandidate> {
    let target = match store.get_idea(id) {
        Ok(Some(idea)) => idea,
        Ok(None) => {
            tracing::warn!(%id, "discovery target is not an idea");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(%id, error = %e, "discovery degraded: target unreadable");
            return Vec::new();
        }
    };

    let pool = match store.list_active(&target.owner) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(%id, error = %e, "discovery degraded: candidate pool unreadable");
            return Vec::new();
        }
    };

    let found = discover(&target, &pool, config);
    tracing::debug!(%id, pool = pool.len(), found = found.len(), "discovered relations");
    found
}

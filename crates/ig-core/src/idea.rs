use serde::{Deserialize, Serialize};

use crate::constants::{MAX_ENERGY, MIN_ENERGY};
use crate::node::NodeId;

/// An authored idea. Owns exactly one DG node with the same id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: NodeId,
    pub owner: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub energy: u8,
    #[serde(default)]
    pub archived: bool,
}

impl Idea {
    pub fn new(owner: &str, title: &str) -> Self {
        Self {
            id: NodeId::new(),
            owner: owner.to_string(),
            title: title.to_string(),
            content: None,
            tags: Vec::new(),
            energy: MIN_ENERGY,
            archived: false,
        }
    }

    /// Empty or whitespace-only content counts as missing.
    pub fn with_content(mut self, content: &str) -> Self {
        let trimmed = content.trim();
        self.content = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_energy(mut self, energy: u8) -> Self {
        self.energy = clamp_energy(energy);
        self
    }

    /// Content with missing treated as empty.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Trim, lower-case and de-duplicate tags, preserving first-seen order.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let t = tag.as_ref().trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

pub fn clamp_energy(energy: u8) -> u8 {
    energy.clamp(MIN_ENERGY, MAX_ENERGY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_normalized() {
        let idea = Idea::new("o", "t").with_tags(&["ML", " data ", "ml", ""]);
        assert_eq!(idea.tags, vec!["ml", "data"]);
    }

    #[test]
    fn test_energy_clamped() {
        assert_eq!(Idea::new("o", "t").with_energy(0).energy, 1);
        assert_eq!(Idea::new("o", "t").with_energy(9).energy, 5);
        assert_eq!(Idea::new("o", "t").with_energy(3).energy, 3);
    }

    #[test]
    fn test_blank_content_is_missing() {
        let idea = Idea::new("o", "t").with_content("   ");
        assert!(idea.content.is_none());
        assert_eq!(idea.content_str(), "");
    }
}

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable node identity. Assigned at creation and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(NodeId)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Named node without internal structure. Unifies by name equality.
    #[default]
    Leaf,
    /// Node carrying labelled arcs.
    Complex,
    /// Reserved. Unified exactly like a leaf.
    Atomic,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leaf => "leaf",
            Self::Complex => "complex",
            Self::Atomic => "atomic",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "complex" => Self::Complex,
            "atomic" => Self::Atomic,
            _ => Self::Leaf,
        }
    }
}

/// Value carried by an arc: a scalar, or a reference to another node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ArcValue {
    Text(String),
    Number(f64),
    Node(NodeId),
}

impl ArcValue {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            ArcValue::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Parse a CLI/tool literal: `@<uuid>` is a node reference, numbers are
    /// numbers, anything else is text.
    pub fn parse_literal(s: &str) -> Result<Self, uuid::Error> {
        if let Some(rest) = s.strip_prefix('@') {
            return rest.parse().map(ArcValue::Node);
        }
        Ok(match s.parse::<f64>() {
            Ok(n) if n.is_finite() => ArcValue::Number(n),
            _ => ArcValue::Text(s.to_string()),
        })
    }
}

impl fmt::Display for ArcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArcValue::Text(s) => write!(f, "{s:?}"),
            ArcValue::Number(n) => write!(f, "{n}"),
            ArcValue::Node(id) => write!(f, "@{id}"),
        }
    }
}

/// A labelled edge or attribute on a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub label: String,
    pub value: ArcValue,
}

impl Arc {
    pub fn new(label: &str, value: ArcValue) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }

    pub fn text(label: &str, value: &str) -> Self {
        Self::new(label, ArcValue::Text(value.to_string()))
    }

    pub fn number(label: &str, value: f64) -> Self {
        Self::new(label, ArcValue::Number(value))
    }

    pub fn node(label: &str, target: NodeId) -> Self {
        Self::new(label, ArcValue::Node(target))
    }
}

/// Directed-graph node: the unit of unification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DGNode {
    pub id: NodeId,
    pub owner: String,
    pub node_type: NodeType,
    pub name: Option<String>,
    pub arc_list: Vec<Arc>,
    /// Arcs received from unification partners. Append-only.
    #[serde(default)]
    pub comp_arc_list: Vec<Arc>,
    /// Set once when this node is unified into another. Never cleared.
    #[serde(default)]
    pub forward_id: Option<NodeId>,
    #[serde(default)]
    pub copy_id: Option<NodeId>,
    #[serde(default)]
    pub generation: u64,
}

impl DGNode {
    fn fresh(owner: &str, node_type: NodeType, name: Option<String>, arcs: Vec<Arc>) -> Self {
        Self {
            id: NodeId::new(),
            owner: owner.to_string(),
            node_type,
            name,
            arc_list: dedup_labels(arcs),
            comp_arc_list: Vec::new(),
            forward_id: None,
            copy_id: None,
            generation: 0,
        }
    }

    pub fn leaf(owner: &str, name: &str) -> Self {
        Self::fresh(owner, NodeType::Leaf, Some(name.to_string()), Vec::new())
    }

    /// Complex node. Duplicate labels are dropped, first occurrence wins.
    pub fn complex(owner: &str, arcs: Vec<Arc>) -> Self {
        Self::fresh(owner, NodeType::Complex, None, arcs)
    }

    pub fn named_complex(owner: &str, name: &str, arcs: Vec<Arc>) -> Self {
        Self::fresh(owner, NodeType::Complex, Some(name.to_string()), arcs)
    }

    /// Leaf and atomic nodes have no structure to merge.
    pub fn is_leaf(&self) -> bool {
        matches!(self.node_type, NodeType::Leaf | NodeType::Atomic)
    }

    pub fn is_complex(&self) -> bool {
        self.node_type == NodeType::Complex
    }

    pub fn is_superseded(&self) -> bool {
        self.forward_id.is_some()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// Partial field update for [`crate::NodeStore::update`]. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeUpdate {
    pub arc_list: Option<Vec<Arc>>,
    pub comp_arc_list: Option<Vec<Arc>>,
    pub forward_id: Option<NodeId>,
    pub copy_id: Option<NodeId>,
    pub generation: Option<u64>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.arc_list.is_none()
            && self.comp_arc_list.is_none()
            && self.forward_id.is_none()
            && self.copy_id.is_none()
            && self.generation.is_none()
    }

    /// Apply to an in-memory snapshot.
    pub fn apply_to(&self, node: &mut DGNode) {
        if let Some(arcs) = &self.arc_list {
            node.arc_list = arcs.clone();
        }
        if let Some(arcs) = &self.comp_arc_list {
            node.comp_arc_list = arcs.clone();
        }
        if let Some(id) = self.forward_id {
            node.forward_id = Some(id);
        }
        if let Some(id) = self.copy_id {
            node.copy_id = Some(id);
        }
        if let Some(g) = self.generation {
            node.generation = g;
        }
    }
}

// --- Arc set operations (all by label) ---

/// First arc with the given label.
pub fn find_arc<'a>(label: &str, arcs: &'a [Arc]) -> Option<&'a Arc> {
    arcs.iter().find(|a| a.label == label)
}

/// Arcs of `arcs2` whose label also appears in `arcs1`.
pub fn intersect_arcs(arcs1: &[Arc], arcs2: &[Arc]) -> Vec<Arc> {
    let labels1: HashSet<&str> = arcs1.iter().map(|a| a.label.as_str()).collect();
    arcs2
        .iter()
        .filter(|a| labels1.contains(a.label.as_str()))
        .cloned()
        .collect()
}

/// Arcs of `arcs1` whose label does not appear in `arcs2`.
pub fn complement_arcs(arcs1: &[Arc], arcs2: &[Arc]) -> Vec<Arc> {
    let labels2: HashSet<&str> = arcs2.iter().map(|a| a.label.as_str()).collect();
    arcs1
        .iter()
        .filter(|a| !labels2.contains(a.label.as_str()))
        .cloned()
        .collect()
}

/// Append the arcs of `extra` whose labels `base` lacks. Entries already in
/// `base` win on conflict.
pub fn union_into(base: &mut Vec<Arc>, extra: &[Arc]) {
    let mut labels: HashSet<String> = base.iter().map(|a| a.label.clone()).collect();
    for arc in extra {
        if labels.insert(arc.label.clone()) {
            base.push(arc.clone());
        }
    }
}

fn dedup_labels(arcs: Vec<Arc>) -> Vec<Arc> {
    let mut seen = HashSet::new();
    arcs.into_iter()
        .filter(|a| seen.insert(a.label.clone()))
        .collect()
}

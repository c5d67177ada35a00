use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use flowstack_core::error::{FlowstackError, Result};

/// The kind of work a node performs.
///
/// Graphs arrive from callers, so unknown kinds are legal members and fold
/// into `Other`; they can sit on a path but carry no behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Query,
    Retrieval,
    Generation,
    Output,
    #[serde(other)]
    Other,
}

/// A typed unit of work in the execution graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique within a graph.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Per-node configuration: `value` on query nodes, `model` and `prompt`
    /// on generation nodes.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: serde_json::Map::new(),
        }
    }

    /// Set a data field, builder-style.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Read a string-valued data field.
    pub fn str_data(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// A directed dependency between two nodes. Duplicates are harmless; the
/// resolver's visited set makes repeated adjacency entries inert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A caller-submitted node/edge set. Constructed fresh per execution
/// request; nothing is retained across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Structural precondition check. Pure; runs on every execution request.
    pub fn validate(&self) -> Result<()> {
        let queries = self.count_kind(NodeKind::Query);
        if queries != 1 {
            return Err(FlowstackError::MalformedGraph(
                "Graph must contain exactly one 'query' node".to_string(),
            ));
        }
        let outputs = self.count_kind(NodeKind::Output);
        if outputs != 1 {
            return Err(FlowstackError::MalformedGraph(
                "Graph must contain exactly one 'output' node".to_string(),
            ));
        }
        Ok(())
    }

    /// Adjacency in edge-declaration order. Order is significant: the
    /// resolver picks the first unvisited neighbor.
    pub fn adjacency(&self) -> HashMap<String, Vec<String>> {
        let mut adj: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &self.edges {
            adj.entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
        adj
    }

    /// First node of the given kind, in node-declaration order.
    pub fn first_of_kind(&self, kind: NodeKind) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == kind)
    }

    fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    File,
    Function,
    Class,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Class => "class",
        }
    }
}

/// Type of relationship between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// File declares entity
    Contains,

    /// Enclosing entity calls a function with a matching name
    Calls,
}

/// Node in the entity graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityNode {
    /// `path` for files, `path:name` for functions and classes
    pub id: String,

    pub kind: EntityKind,

    /// Display label (the path for files, the simple name otherwise)
    pub label: String,

    /// Owning file path
    pub file_path: String,

    /// Simple name for functions and classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// 1-based line range of the definition
    #[serde(default)]
    pub start_line: usize,
    #[serde(default)]
    pub end_line: usize,
}

impl EntityNode {
    pub fn file(path: &str, line_count: usize) -> Self {
        Self {
            id: path.to_string(),
            kind: EntityKind::File,
            label: path.to_string(),
            file_path: path.to_string(),
            name: None,
            start_line: 1,
            end_line: line_count.max(1),
        }
    }

    pub fn definition(
        path: &str,
        name: &str,
        kind: EntityKind,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            id: entity_id(path, name),
            kind,
            label: name.to_string(),
            file_path: path.to_string(),
            name: Some(name.to_string()),
            start_line,
            end_line,
        }
    }
}

/// Identifier of a function or class declared in `path`
pub fn entity_id(path: &str, name: &str) -> String {
    format!("{path}:{name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub kind: EdgeKind,
}

/// Serializable node-link form of an [`EntityGraph`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<EntityNode>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// Directed graph of files, functions and classes
///
/// Built once per indexing run and read-only afterwards.
#[derive(Debug, Clone)]
pub struct EntityGraph {
    pub(crate) graph: DiGraph<EntityNode, EntityEdge>,

    /// Node id -> NodeIndex
    pub(crate) id_index: HashMap<String, NodeIndex>,

    /// Simple name -> Function nodes carrying it
    pub(crate) function_names: HashMap<String, Vec<NodeIndex>>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_index: HashMap::new(),
            function_names: HashMap::new(),
        }
    }

    /// Add a node unless its identifier is already present
    ///
    /// Returns the index and whether the node was inserted.
    pub fn add_node(&mut self, node: EntityNode) -> (NodeIndex, bool) {
        if let Some(&idx) = self.id_index.get(&node.id) {
            return (idx, false);
        }

        let id = node.id.clone();
        let function_name = match (node.kind, &node.name) {
            (EntityKind::Function, Some(name)) => Some(name.clone()),
            _ => None,
        };

        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        if let Some(name) = function_name {
            self.function_names.entry(name).or_default().push(idx);
        }

        (idx, true)
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        self.graph.add_edge(from, to, EntityEdge { kind });
    }

    pub fn find(&self, id: &str) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&EntityNode> {
        self.graph.node_weight(idx)
    }

    pub fn node_by_id(&self, id: &str) -> Option<&EntityNode> {
        self.find(id).and_then(|idx| self.node(idx))
    }

    /// Function nodes whose simple name equals `name`, in insertion order
    pub fn functions_named(&self, name: &str) -> &[NodeIndex] {
        self.function_names
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &EntityNode)> {
        self.graph
            .node_indices()
            .filter_map(move |idx| self.graph.node_weight(idx).map(|node| (idx, node)))
    }

    pub fn nodes_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityNode> {
        self.nodes()
            .map(|(_, node)| node)
            .filter(move |node| node.kind == kind)
    }

    /// All edges as (source, target, kind)
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, EdgeKind)> + '_ {
        self.graph.edge_indices().filter_map(move |e| {
            let (from, to) = self.graph.edge_endpoints(e)?;
            let weight = self.graph.edge_weight(e)?;
            Some((from, to, weight.kind))
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edge_count_of(&self, kind: EdgeKind) -> usize {
        self.edges().filter(|(_, _, k)| *k == kind).count()
    }
}

impl Default for EntityGraph {
    fn default() -> Self {
        Self::new()
    }
}

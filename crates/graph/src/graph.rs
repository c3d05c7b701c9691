use crate::error::{GraphError, Result};
use crate::types::{EdgeKind, EdgeRecord, EntityGraph, EntityNode, GraphSnapshot};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

impl EntityGraph {
    /// Nodes the given node calls (outgoing Calls edges, one entry per call site)
    pub fn callees(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_by(node, EdgeKind::Calls, Direction::Outgoing)
    }

    /// Nodes that call the given node (incoming Calls edges)
    pub fn callers(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_by(node, EdgeKind::Calls, Direction::Incoming)
    }

    /// Entities declared by a file node
    pub fn members(&self, file: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_by(file, EdgeKind::Contains, Direction::Outgoing)
    }

    /// Entities declared by the file with the given path
    pub fn members_of(&self, path: &str) -> Result<Vec<&EntityNode>> {
        let idx = self
            .find(path)
            .ok_or_else(|| GraphError::NodeNotFound(path.to_string()))?;
        Ok(self
            .members(idx)
            .into_iter()
            .filter_map(|member| self.node(member))
            .collect())
    }

    fn neighbors_by(&self, node: NodeIndex, kind: EdgeKind, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<(usize, NodeIndex)> = self
            .graph
            .edges_directed(node, dir)
            .filter(|e| e.weight().kind == kind)
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id().index(), other)
            })
            .collect();
        // petgraph walks adjacency lists newest-first; report in insertion order
        out.sort_by_key(|(edge, _)| *edge);
        out.into_iter().map(|(_, other)| other).collect()
    }

    /// Export as plain node/edge records
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self.nodes().map(|(_, node)| node.clone()).collect();
        let edges = self
            .edges()
            .filter_map(|(from, to, kind)| {
                Some(EdgeRecord {
                    source: self.node(from)?.id.clone(),
                    target: self.node(to)?.id.clone(),
                    kind,
                })
            })
            .collect();
        GraphSnapshot { nodes, edges }
    }

    /// Rebuild a graph from node/edge records
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let mut graph = EntityGraph::new();
        for node in snapshot.nodes {
            let id = node.id.clone();
            let (_, inserted) = graph.add_node(node);
            if !inserted {
                return Err(GraphError::DuplicateNode(id));
            }
        }
        for edge in snapshot.edges {
            let from = graph
                .find(&edge.source)
                .ok_or_else(|| GraphError::DanglingEdge(edge.source.clone()))?;
            let to = graph
                .find(&edge.target)
                .ok_or_else(|| GraphError::DanglingEdge(edge.target.clone()))?;
            graph.add_edge(from, to, edge.kind);
        }
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }
}

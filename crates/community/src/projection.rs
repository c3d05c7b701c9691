use atlas_graph::EntityGraph;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

/// Undirected, unit-weight view of an entity graph
///
/// Node `i` of the projection is node `i` of the source graph. Parallel edges and
/// opposite directions collapse into one edge; self-loops are dropped.
#[derive(Debug, Clone)]
pub struct Projection {
    graph: UnGraph<String, f64>,
}

impl Projection {
    pub fn from_entity_graph(source: &EntityGraph) -> Self {
        let mut graph = UnGraph::with_capacity(source.node_count(), source.edge_count());
        for (_, node) in source.nodes() {
            graph.add_node(node.id.clone());
        }
        for (from, to, _) in source.edges() {
            if from == to {
                continue;
            }
            graph.update_edge(
                NodeIndex::new(from.index()),
                NodeIndex::new(to.index()),
                1.0,
            );
        }
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_id(&self, index: usize) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(index))
            .map(String::as_str)
    }

    /// Neighbour lists with weights, sorted by neighbour index
    pub fn adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); self.graph.node_count()];
        for edge in self.graph.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            adjacency[a].push((b, *edge.weight()));
            adjacency[b].push((a, *edge.weight()));
        }
        for neighbours in &mut adjacency {
            neighbours.sort_by_key(|(j, _)| *j);
        }
        adjacency
    }
}

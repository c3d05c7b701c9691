use crate::leiden::{leiden, modularity, LeidenConfig};
use crate::partition::Partition;
use crate::projection::Projection;
use atlas_graph::EntityGraph;

/// Partitions an entity graph into communities of related code
#[derive(Debug, Clone, Default)]
pub struct CommunityDetector {
    config: LeidenConfig,
}

impl CommunityDetector {
    pub fn new(config: LeidenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LeidenConfig {
        &self.config
    }

    /// Run Leiden on the undirected projection of `graph`
    ///
    /// Every node ends up in exactly one community; nodes without edges become
    /// singletons. An empty graph yields an empty partition.
    pub fn detect(&self, graph: &EntityGraph) -> Partition {
        let projection = Projection::from_entity_graph(graph);
        if projection.node_count() == 0 {
            log::info!("Empty graph, no communities to detect");
            return Partition::default();
        }

        let adjacency = projection.adjacency();
        let membership = leiden(adjacency.clone(), &self.config);

        let count = membership.iter().max().map_or(0, |max| max + 1);
        let mut groups: Vec<Vec<String>> = vec![Vec::new(); count];
        for (index, &community) in membership.iter().enumerate() {
            if let Some(id) = projection.node_id(index) {
                groups[community].push(id.to_string());
            }
        }

        log::info!(
            "Detected {} communities over {} nodes and {} undirected edges (modularity {:.4})",
            count,
            projection.node_count(),
            projection.edge_count(),
            modularity(&adjacency, &membership, self.config.resolution)
        );

        Partition::from_groups(groups)
    }
}

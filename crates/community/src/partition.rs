use crate::error::{CommunityError, Result};
use atlas_graph::EntityGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type CommunityId = usize;

/// Disjoint communities covering every node of a graph
///
/// Ids follow enumeration order and carry no meaning across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition {
    communities: BTreeMap<CommunityId, BTreeSet<String>>,
}

impl Partition {
    /// Number the groups 0.. in the given order; empty groups are dropped
    pub fn from_groups<I, G>(groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: IntoIterator<Item = String>,
    {
        let communities = groups
            .into_iter()
            .map(|group| group.into_iter().collect::<BTreeSet<_>>())
            .filter(|members| !members.is_empty())
            .enumerate()
            .collect();
        Self { communities }
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.communities.values().map(BTreeSet::len).sum()
    }

    pub fn members(&self, id: CommunityId) -> Option<&BTreeSet<String>> {
        self.communities.get(&id)
    }

    /// Communities in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (CommunityId, &BTreeSet<String>)> {
        self.communities.iter().map(|(id, members)| (*id, members))
    }

    pub fn community_of(&self, node_id: &str) -> Option<CommunityId> {
        self.communities
            .iter()
            .find(|(_, members)| members.contains(node_id))
            .map(|(id, _)| *id)
    }

    /// Check that the communities cover every graph node exactly once
    pub fn validate_against(&self, graph: &EntityGraph) -> Result<()> {
        let mut seen: HashMap<&str, CommunityId> = HashMap::new();
        for (id, members) in self.iter() {
            for node in members {
                if graph.find(node).is_none() {
                    return Err(CommunityError::UnknownNode {
                        community: id,
                        node: node.clone(),
                    });
                }
                if let Some(first) = seen.insert(node.as_str(), id) {
                    return Err(CommunityError::Overlap {
                        node: node.clone(),
                        first,
                        second: id,
                    });
                }
            }
        }
        for (_, node) in graph.nodes() {
            if !seen.contains_key(node.id.as_str()) {
                return Err(CommunityError::Unassigned(node.id.clone()));
            }
        }
        Ok(())
    }
}

/// A community together with its optional description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Serializable partition plus summaries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunitySnapshot {
    pub communities: Partition,
    #[serde(default)]
    pub summaries: BTreeMap<CommunityId, String>,
}

impl CommunitySnapshot {
    pub fn new(communities: Partition, summaries: BTreeMap<CommunityId, String>) -> Self {
        Self {
            communities,
            summaries,
        }
    }

    pub fn communities(&self) -> Vec<Community> {
        self.communities
            .iter()
            .map(|(id, members)| Community {
                id,
                members: members.iter().cloned().collect(),
                summary: self.summaries.get(&id).cloned(),
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

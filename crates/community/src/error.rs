use thiserror::Error;

pub type Result<T> = std::result::Result<T, CommunityError>;

#[derive(Error, Debug)]
pub enum CommunityError {
    #[error("Node {0} is not assigned to any community")]
    Unassigned(String),

    #[error("Node {node} belongs to communities {first} and {second}")]
    Overlap {
        node: String,
        first: usize,
        second: usize,
    },

    #[error("Community {community} contains unknown node {node}")]
    UnknownNode { community: usize, node: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

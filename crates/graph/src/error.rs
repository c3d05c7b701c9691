use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to load grammar for {language}: {reason}")]
    LanguageSetup { language: String, reason: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Snapshot references unknown node: {0}")]
    DanglingEdge(String),

    #[error("Duplicate node identifier in snapshot: {0}")]
    DuplicateNode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Document metadata requires a non-empty `source`")]
    MissingSource,

    #[error("Dense retrieval failed for category '{category}'")]
    DenseRetrieval {
        category: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

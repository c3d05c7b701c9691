use crate::document::Document;
use std::cmp::Ordering;

/// Dense (embedding) retrieval backend
///
/// Scores may be on any scale; callers normalize them.
pub trait DenseRetriever {
    fn similarity_search(&self, query: &str, k: usize) -> anyhow::Result<Vec<(Document, f64)>>;
}

/// Dense hits computed elsewhere, replayed for every query
#[derive(Debug, Clone, Default)]
pub struct PrecomputedDense {
    results: Vec<(Document, f64)>,
}

impl PrecomputedDense {
    pub fn new(mut results: Vec<(Document, f64)>) -> Self {
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Self { results }
    }

    pub fn results(&self) -> &[(Document, f64)] {
        &self.results
    }
}

impl DenseRetriever for PrecomputedDense {
    fn similarity_search(&self, _query: &str, k: usize) -> anyhow::Result<Vec<(Document, f64)>> {
        Ok(self.results.iter().take(k).cloned().collect())
    }
}

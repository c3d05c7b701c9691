use crate::bm25::SparseIndex;
use crate::config::PlannerConfig;
use crate::dense::DenseRetriever;
use crate::document::Document;
use crate::error::{Result, SearchError};
use crate::fusion::{normalize_scores, sort_by_final_score, CandidatePool, RankedCandidate};
use std::collections::{BTreeMap, HashSet};

/// Retrieval backends of one corpus category
pub struct CategoryUnit {
    pub dense: Box<dyn DenseRetriever + Send + Sync>,
    pub sparse: Option<SparseIndex>,
}

impl CategoryUnit {
    pub fn new(
        dense: impl DenseRetriever + Send + Sync + 'static,
        sparse: Option<SparseIndex>,
    ) -> Self {
        Self {
            dense: Box::new(dense),
            sparse,
        }
    }
}

/// Plans per-category candidate pools and blends their dense and sparse hits
#[derive(Debug, Clone, Default)]
pub struct CandidatePlanner {
    config: PlannerConfig,
}

impl CandidatePlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// `max(base, 1) * multiplier`, clamped to the configured method range
    pub fn plan_method_k(&self, base: usize, multiplier: usize) -> usize {
        base.max(1)
            .saturating_mul(multiplier)
            .clamp(self.config.min_method_k, self.config.max_method_k)
    }

    /// Candidates from every category, renormalized together and capped
    ///
    /// Categories missing from `category_top_k` use a base of 1.
    pub fn gather(
        &self,
        query: &str,
        units: &BTreeMap<String, CategoryUnit>,
    ) -> Result<Vec<RankedCandidate>> {
        let mut candidates = Vec::new();
        for (category, unit) in units {
            let base = self
                .config
                .category_top_k
                .get(category)
                .copied()
                .unwrap_or(1);
            let dense_k = self.plan_method_k(base, self.config.dense_multiplier);
            let sparse_k = self.plan_method_k(base, self.config.sparse_multiplier);
            let found = self.collect_category(category, unit, query, dense_k, sparse_k)?;
            log::debug!(
                "Category '{}': {} candidates (dense k {}, sparse k {})",
                category,
                found.len(),
                dense_k,
                sparse_k
            );
            candidates.extend(found);
        }

        if candidates.is_empty() {
            return Ok(candidates);
        }

        let finals: Vec<f64> = candidates.iter().map(|c| c.final_score).collect();
        for (candidate, score) in candidates.iter_mut().zip(normalize_scores(&finals)) {
            candidate.final_score = score;
        }
        sort_by_final_score(&mut candidates);
        candidates.truncate(self.config.max_total_candidates);
        Ok(candidates)
    }

    fn collect_category(
        &self,
        category: &str,
        unit: &CategoryUnit,
        query: &str,
        dense_k: usize,
        sparse_k: usize,
    ) -> Result<Vec<RankedCandidate>> {
        let mut pool = CandidatePool::default();

        let dense_hits = unit
            .dense
            .similarity_search(query, dense_k)
            .map_err(|source| SearchError::DenseRetrieval {
                category: category.to_string(),
                source,
            })?;
        let dense_norm = normalize_scores(&dense_hits.iter().map(|(_, s)| *s).collect::<Vec<_>>());
        for ((document, _), score) in dense_hits.iter().zip(dense_norm) {
            let candidate = pool_entry(&mut pool, category, document);
            candidate.dense_score = candidate.dense_score.max(score);
        }

        if let Some(sparse) = unit.sparse.as_ref().filter(|_| sparse_k > 0) {
            let sparse_hits = sparse.search(query, sparse_k);
            let sparse_norm =
                normalize_scores(&sparse_hits.iter().map(|(_, s)| *s).collect::<Vec<_>>());
            for ((document, _), score) in sparse_hits.iter().zip(sparse_norm) {
                let candidate = pool_entry(&mut pool, category, document);
                candidate.sparse_score = candidate.sparse_score.max(score);
            }
        }

        let mut candidates = pool.into_candidates();
        for candidate in &mut candidates {
            candidate.final_score = self.config.dense_weight * candidate.dense_score
                + self.config.sparse_weight * candidate.sparse_score;
        }
        Ok(candidates)
    }
}

fn pool_entry<'a>(
    pool: &'a mut CandidatePool,
    category: &str,
    document: &Document,
) -> &'a mut RankedCandidate {
    let tagged = document.with_category(category);
    let key = format!("{category}|{}", tagged.key());
    pool.entry(key.clone(), || {
        RankedCandidate::new(key, category.to_string(), tagged)
    })
}

/// Numbered fragments for an answer-synthesis prompt
pub fn format_context(documents: &[Document]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(idx, document)| {
            let mut header = format!("[Fragment {}]", idx + 1);
            if let Some(category) = document.metadata.get_str(crate::document::CATEGORY_KEY) {
                header.push_str(&format!(" | category: {category}"));
            }
            header.push_str(&format!(" | source: {}", document.source()));
            format!("{header}\n{}", document.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `category:source` (or bare source) per document, first occurrence only
pub fn collect_sources(documents: &[Document]) -> Vec<String> {
    let mut seen = HashSet::new();
    documents
        .iter()
        .map(|document| match document.metadata.get_str(crate::document::CATEGORY_KEY) {
            Some(category) => format!("{category}:{}", document.source()),
            None => document.source().to_string(),
        })
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Min-max scale to [0, 1]; an all-equal list maps to all 1.0
pub fn normalize_scores(values: &[f64]) -> Vec<f64> {
    let Some(max) = values.iter().copied().reduce(f64::max) else {
        return Vec::new();
    };
    let min = values.iter().copied().fold(max, f64::min);
    let span = max - min;
    if span.abs() <= 1e-9 * max.abs().max(min.abs()) || span == 0.0 {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / span).collect()
}

/// Fused retrieval candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub key: String,
    pub category: String,
    pub document: Document,
    pub dense_score: f64,
    pub sparse_score: f64,
    pub final_score: f64,
}

impl RankedCandidate {
    pub fn new(key: String, category: String, document: Document) -> Self {
        Self {
            key,
            category,
            document,
            dense_score: 0.0,
            sparse_score: 0.0,
            final_score: 0.0,
        }
    }
}

/// Candidates keyed by document key, in first-seen order
#[derive(Default)]
pub(crate) struct CandidatePool {
    candidates: Vec<RankedCandidate>,
    positions: HashMap<String, usize>,
}

impl CandidatePool {
    pub(crate) fn entry(
        &mut self,
        key: String,
        make: impl FnOnce() -> RankedCandidate,
    ) -> &mut RankedCandidate {
        let position = match self.positions.get(&key) {
            Some(&position) => position,
            None => {
                self.candidates.push(make());
                self.positions.insert(key, self.candidates.len() - 1);
                self.candidates.len() - 1
            }
        };
        &mut self.candidates[position]
    }

    pub(crate) fn into_candidates(self) -> Vec<RankedCandidate> {
        self.candidates
    }
}

/// Stable descending sort by final score
pub(crate) fn sort_by_final_score(candidates: &mut [RankedCandidate]) {
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
    });
}

/// Blend dense and sparse hits: `final = alpha * dense + (1 - alpha) * sparse`
///
/// Each side is min-max normalized on its own; a document missing from one side scores 0
/// there. `alpha` is clamped to [0, 1]. Returns the best `top_k` candidates.
pub fn fuse_hybrid(
    dense: &[(Document, f64)],
    sparse: &[(Document, f64)],
    alpha: f64,
    top_k: usize,
) -> Vec<RankedCandidate> {
    if top_k == 0 {
        return Vec::new();
    }
    let alpha = alpha.clamp(0.0, 1.0);

    let mut pool = CandidatePool::default();
    let dense_norm = normalize_scores(&dense.iter().map(|(_, s)| *s).collect::<Vec<_>>());
    for ((document, _), score) in dense.iter().zip(dense_norm) {
        let key = document.key();
        let candidate = pool.entry(key.clone(), || {
            RankedCandidate::new(key, document.category().to_string(), document.clone())
        });
        candidate.dense_score = candidate.dense_score.max(score);
    }

    let sparse_norm = normalize_scores(&sparse.iter().map(|(_, s)| *s).collect::<Vec<_>>());
    for ((document, _), score) in sparse.iter().zip(sparse_norm) {
        let key = document.key();
        let candidate = pool.entry(key.clone(), || {
            RankedCandidate::new(key, document.category().to_string(), document.clone())
        });
        candidate.sparse_score = candidate.sparse_score.max(score);
    }

    let mut candidates = pool.into_candidates();
    for candidate in &mut candidates {
        candidate.final_score = alpha * candidate.dense_score + (1.0 - alpha) * candidate.sparse_score;
    }
    sort_by_final_score(&mut candidates);
    candidates.truncate(top_k);

    log::debug!(
        "Hybrid fusion: {} dense + {} sparse -> {} candidates (alpha {:.2})",
        dense.len(),
        sparse.len(),
        candidates.len(),
        alpha
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn doc(text: &str, source: &str) -> Document {
        Document::new(text, source).unwrap()
    }

    #[test]
    fn normalize_handles_uniform_and_empty() {
        assert!(normalize_scores(&[]).is_empty());
        assert_eq!(normalize_scores(&[3.0, 3.0]), vec![1.0, 1.0]);
        assert_eq!(normalize_scores(&[7.5]), vec![1.0]);
        assert_eq!(normalize_scores(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn dense_singletons_and_sparse_singletons_meet_at_the_bounds() {
        let a = doc("alpha", "a.rs");
        let b = doc("beta", "b.rs");
        let fused = fuse_hybrid(
            &[(a.clone(), 0.9), (b.clone(), 0.3)],
            &[(b.clone(), 5.0)],
            0.6,
            10,
        );

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].document, a);
        assert!((fused[0].final_score - 0.6).abs() < 1e-12);
        assert_eq!(fused[1].document, b);
        assert!((fused[1].final_score - 0.4).abs() < 1e-12);
        assert_eq!(fused[1].dense_score, 0.0);
        assert_eq!(fused[1].sparse_score, 1.0);
    }

    #[test]
    fn alpha_is_clamped_and_top_k_truncates() {
        let a = doc("alpha", "a.rs");
        let b = doc("beta", "b.rs");
        let fused = fuse_hybrid(&[(a.clone(), 1.0)], &[(b, 1.0)], 4.0, 1);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].document, a);
        assert_eq!(fused[0].final_score, 1.0);
        assert!(fuse_hybrid(&[(a, 1.0)], &[], 0.5, 0).is_empty());
    }

    #[test]
    fn category_defaults_to_unknown() {
        let tagged = doc("x", "x.md").with_category("text");
        let fused = fuse_hybrid(&[(tagged, 1.0), (doc("y", "y.md"), 0.5)], &[], 0.5, 5);
        assert_eq!(fused[0].category, "text");
        assert_eq!(fused[1].category, "unknown");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent_and_bounded(values in proptest::collection::vec(-1e6f64..1e6, 0..20)) {
            let once = normalize_scores(&values);
            prop_assert_eq!(once.len(), values.len());
            prop_assert!(once.iter().all(|v| (0.0..=1.0).contains(v)));
            let twice = normalize_scores(&once);
            for (a, b) in once.iter().zip(&twice) {
                prop_assert!((a - b).abs() < 1e-9);
            }
        }
    }
}

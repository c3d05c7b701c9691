use crate::fusion::RankedCandidate;
use crate::tokenizer::{default_tokenizer, Tokenizer};
use std::collections::HashMap;

type TermCounts = HashMap<String, usize>;

/// Maximal Marginal Relevance selection over fused candidates
///
/// `score = lambda * relevance - (1 - lambda) * max_similarity_to_selected`, where
/// relevance is the bag-of-words cosine to the query, or the candidate's final score
/// when the query has no terms or the cosine is zero.
#[derive(Clone, Copy)]
pub struct MmrSelector {
    lambda: f64,
    tokenizer: Tokenizer,
}

impl MmrSelector {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda: lambda.clamp(0.0, 1.0),
            tokenizer: default_tokenizer,
        }
    }

    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn select(
        &self,
        candidates: Vec<RankedCandidate>,
        query: &str,
        top_n: usize,
    ) -> Vec<RankedCandidate> {
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let query_counts = term_counts(self.tokenizer, query);
        let mut remaining: Vec<(RankedCandidate, TermCounts)> = candidates
            .into_iter()
            .map(|candidate| {
                let counts = term_counts(self.tokenizer, &candidate.document.content);
                (candidate, counts)
            })
            .collect();
        let mut selected: Vec<(RankedCandidate, TermCounts)> = Vec::new();

        while !remaining.is_empty() && selected.len() < top_n {
            let mut best_idx = 0;
            let mut best_score = f64::NEG_INFINITY;

            for (idx, (candidate, counts)) in remaining.iter().enumerate() {
                let mut relevance = candidate.final_score;
                if !query_counts.is_empty() {
                    let similarity = cosine(counts, &query_counts);
                    if similarity != 0.0 {
                        relevance = similarity;
                    }
                }

                let penalty = selected
                    .iter()
                    .map(|(_, chosen)| cosine(counts, chosen))
                    .fold(0.0, f64::max);

                let score = self.lambda * relevance - (1.0 - self.lambda) * penalty;
                if score > best_score {
                    best_score = score;
                    best_idx = idx;
                }
            }

            selected.push(remaining.remove(best_idx));
        }

        selected.into_iter().map(|(candidate, _)| candidate).collect()
    }
}

impl Default for MmrSelector {
    fn default() -> Self {
        Self::new(0.5)
    }
}

fn term_counts(tokenizer: Tokenizer, text: &str) -> TermCounts {
    let mut counts = HashMap::new();
    for token in tokenizer(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

fn cosine(a: &TermCounts, b: &TermCounts) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(term, &x)| b.get(term).map(|&y| (x * y) as f64))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }
    let norm = |counts: &TermCounts| {
        counts
            .values()
            .map(|&v| (v * v) as f64)
            .sum::<f64>()
            .sqrt()
    };
    let (norm_a, norm_b) = (norm(a), norm(b));
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use pretty_assertions::assert_eq;

    fn candidate(text: &str, source: &str, final_score: f64) -> RankedCandidate {
        let document = Document::new(text, source).unwrap();
        let mut candidate = RankedCandidate::new(document.key(), "code".into(), document);
        candidate.final_score = final_score;
        candidate
    }

    fn sources(selected: &[RankedCandidate]) -> Vec<&str> {
        selected.iter().map(|c| c.document.source()).collect()
    }

    #[test]
    fn pure_relevance_follows_query_similarity() {
        let candidates = vec![
            candidate("retry network", "a", 0.1),
            candidate("cache eviction policy", "b", 0.2),
            candidate("cache policy", "c", 0.3),
        ];
        let picked = MmrSelector::new(1.0).select(candidates, "cache policy", 3);
        assert_eq!(sources(&picked), vec!["c", "b", "a"]);
    }

    #[test]
    fn diversity_penalizes_near_duplicates() {
        let candidates = vec![
            candidate("cache policy lru", "a", 0.9),
            candidate("cache policy lru", "b", 0.8),
            candidate("cache warmup", "c", 0.7),
        ];
        let picked = MmrSelector::new(0.3).select(candidates.clone(), "cache policy", 2);
        assert_eq!(sources(&picked), vec!["a", "c"]);

        let picked = MmrSelector::new(1.0).select(candidates, "cache policy", 2);
        assert_eq!(sources(&picked), vec!["a", "b"]);
    }

    #[test]
    fn top_n_beyond_candidates_returns_all() {
        let candidates = vec![candidate("x", "a", 0.1), candidate("y", "b", 0.2)];
        let picked = MmrSelector::default().select(candidates, "x", 10);
        assert_eq!(sources(&picked), vec!["a", "b"]);
    }

    #[test]
    fn empty_query_falls_back_to_final_scores() {
        let candidates = vec![
            candidate("one", "a", 0.2),
            candidate("two", "b", 0.9),
        ];
        let picked = MmrSelector::new(1.0).select(candidates, "", 5);
        assert_eq!(sources(&picked), vec!["b", "a"]);
    }

    fn case_sensitive(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn custom_tokenizer_drives_similarity() {
        let candidates = vec![candidate("Cache", "a", 0.9), candidate("cache", "b", 0.1)];
        let picked = MmrSelector::new(1.0).select(candidates.clone(), "cache", 2);
        assert_eq!(sources(&picked), vec!["a", "b"]);

        let picked = MmrSelector::new(1.0)
            .with_tokenizer(case_sensitive)
            .select(candidates, "cache", 2);
        assert_eq!(sources(&picked), vec!["b", "a"]);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(MmrSelector::default().select(Vec::new(), "q", 3).is_empty());
        assert!(MmrSelector::default()
            .select(vec![candidate("x", "a", 1.0)], "q", 0)
            .is_empty());
        assert_eq!(MmrSelector::new(-2.0).lambda(), 0.0);
    }

    #[test]
    fn ties_go_to_the_earliest_candidate() {
        let candidates = vec![
            candidate("same", "a", 0.5),
            candidate("same", "b", 0.5),
        ];
        let picked = MmrSelector::new(1.0).select(candidates, "same", 1);
        assert_eq!(sources(&picked), vec!["a"]);
    }
}

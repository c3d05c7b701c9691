use crate::document::Document;
use crate::tokenizer::{default_tokenizer, Tokenizer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// In-memory BM25 index over a fixed document list
pub struct SparseIndex {
    documents: Vec<Document>,
    term_freqs: Vec<HashMap<String, usize>>,
    lengths: Vec<usize>,
    idf: HashMap<String, f64>,
    avg_len: f64,
    params: Bm25Params,
    tokenizer: Tokenizer,
}

impl SparseIndex {
    pub fn build(documents: impl IntoIterator<Item = Document>) -> Self {
        Self::build_with(documents, default_tokenizer, Bm25Params::default())
    }

    pub fn build_with(
        documents: impl IntoIterator<Item = Document>,
        tokenizer: Tokenizer,
        params: Bm25Params,
    ) -> Self {
        let mut docs = Vec::new();
        let mut term_freqs = Vec::new();
        let mut lengths = Vec::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for document in documents {
            let tokens = tokenizer(&document.content);
            let mut freq: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *freq.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            lengths.push(tokens.len());
            term_freqs.push(freq);
            docs.push(document);
        }

        let doc_count = docs.len() as f64;
        let total_len: usize = lengths.iter().sum();
        let avg_len = if docs.is_empty() {
            0.0
        } else {
            total_len as f64 / doc_count
        };
        let idf = doc_freq
            .into_iter()
            .map(|(term, df)| (term, bm25_idf(doc_count, df as f64)))
            .collect();

        Self {
            documents: docs,
            term_freqs,
            lengths,
            idf,
            avg_len,
            params,
            tokenizer,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Top `top_k` documents with a positive score, best first
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(Document, f64)> {
        self.search_positions(query, top_k)
            .into_iter()
            .map(|(idx, score)| (self.documents[idx].clone(), score))
            .collect()
    }

    /// Like [`search`](Self::search) but returns positions into [`documents`](Self::documents)
    pub fn search_positions(&self, query: &str, top_k: usize) -> Vec<(usize, f64)> {
        if self.documents.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let query_tokens = (self.tokenizer)(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let avg_len = self.avg_len.max(1.0);
        let Bm25Params { k1, b } = self.params;

        let mut scored: Vec<(usize, f64)> = Vec::new();
        for (idx, freq) in self.term_freqs.iter().enumerate() {
            if freq.is_empty() {
                continue;
            }
            let doc_len = self.lengths[idx].max(1) as f64;
            let mut score = 0.0;
            for term in &query_tokens {
                let (Some(&tf), Some(&idf)) = (freq.get(term), self.idf.get(term)) else {
                    continue;
                };
                let tf = tf as f64;
                let denom = tf + k1 * (1.0 - b + b * doc_len / avg_len);
                score += idf * (tf * (k1 + 1.0)) / denom;
            }
            if score > 0.0 {
                scored.push((idx, score));
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

fn bm25_idf(total_docs: f64, df: f64) -> f64 {
    ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln()
}

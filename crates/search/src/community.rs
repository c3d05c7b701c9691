use crate::bm25::{Bm25Params, SparseIndex};
use crate::document::{Document, DocumentMetadata};
use crate::fusion::{fuse_hybrid, RankedCandidate};
use crate::tokenizer::{default_tokenizer, Tokenizer};
use atlas_community::{CommunityId, CommunitySnapshot, Partition};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A community selected for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityMatch {
    pub community_id: CommunityId,
    pub summary: String,
    pub members: Vec<String>,
    pub relevance_score: f64,
}

/// Two-stage retrieval: rank communities by their summaries, then search inside the
/// best ones
///
/// Falls back to a flat search over every document when no community summary matches.
pub struct CommunityFirstRetriever {
    communities: BTreeMap<CommunityId, Vec<String>>,
    documents: Vec<Document>,
    community_docs: BTreeMap<CommunityId, Vec<Document>>,

    /// Community ids aligned with the documents of `summary_index`
    summary_ids: Vec<CommunityId>,
    summaries: Vec<String>,
    summary_index: Option<SparseIndex>,

    fallback: OnceCell<SparseIndex>,
    tokenizer: Tokenizer,
    params: Bm25Params,
}

impl CommunityFirstRetriever {
    pub fn new(
        partition: &Partition,
        summaries: &BTreeMap<CommunityId, String>,
        documents: Vec<Document>,
    ) -> Self {
        Self::with_options(
            partition,
            summaries,
            documents,
            default_tokenizer,
            Bm25Params::default(),
        )
    }

    pub fn from_snapshot(snapshot: &CommunitySnapshot, documents: Vec<Document>) -> Self {
        Self::new(&snapshot.communities, &snapshot.summaries, documents)
    }

    pub fn with_options(
        partition: &Partition,
        summaries: &BTreeMap<CommunityId, String>,
        documents: Vec<Document>,
        tokenizer: Tokenizer,
        params: Bm25Params,
    ) -> Self {
        let communities: BTreeMap<CommunityId, Vec<String>> = partition
            .iter()
            .map(|(id, members)| (id, members.iter().cloned().collect()))
            .collect();

        let community_docs = assign_documents(&communities, &documents);
        let assigned: usize = community_docs.values().map(Vec::len).sum();
        log::info!(
            "Assigned {} of {} documents to {} communities",
            assigned,
            documents.len(),
            community_docs.len()
        );

        let summary_ids: Vec<CommunityId> = summaries.keys().copied().collect();
        let summary_texts: Vec<String> = summaries.values().cloned().collect();
        let summary_index = if summary_ids.is_empty() {
            None
        } else {
            let summary_docs = summary_ids
                .iter()
                .zip(&summary_texts)
                .map(|(id, text)| {
                    Document::with_metadata(text.clone(), summary_metadata(*id))
                });
            Some(SparseIndex::build_with(summary_docs, tokenizer, params))
        };

        Self {
            communities,
            documents,
            community_docs,
            summary_ids,
            summaries: summary_texts,
            summary_index,
            fallback: OnceCell::new(),
            tokenizer,
            params,
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Documents mapped to `community`, in corpus order
    pub fn community_documents(&self, community: CommunityId) -> &[Document] {
        self.community_docs
            .get(&community)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Stage 1: communities whose summaries best match the query
    pub fn retrieve_communities(&self, query: &str, top_k: usize) -> Vec<CommunityMatch> {
        let Some(index) = &self.summary_index else {
            return Vec::new();
        };

        index
            .search_positions(query, top_k)
            .into_iter()
            .map(|(position, score)| {
                let community_id = self.summary_ids[position];
                CommunityMatch {
                    community_id,
                    summary: self.summaries[position].clone(),
                    members: self
                        .communities
                        .get(&community_id)
                        .cloned()
                        .unwrap_or_default(),
                    relevance_score: score,
                }
            })
            .collect()
    }

    /// Stage 2: search inside each community, merged and deduplicated by document key
    pub fn retrieve_from_communities(
        &self,
        query: &str,
        community_ids: &[CommunityId],
        top_k_per_community: usize,
    ) -> Vec<(Document, f64)> {
        let mut hits: Vec<(Document, f64)> = Vec::new();
        for id in community_ids {
            let docs = self.community_documents(*id);
            if docs.is_empty() {
                continue;
            }
            let index = SparseIndex::build_with(docs.iter().cloned(), self.tokenizer, self.params);
            hits.extend(index.search(query, top_k_per_community));
        }

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        let mut seen = HashSet::new();
        hits.retain(|(document, _)| seen.insert(document.key()));
        hits
    }

    /// Community-first retrieval with flat fallback
    pub fn retrieve(
        &self,
        query: &str,
        top_k_communities: usize,
        top_k_per_community: usize,
        top_k_total: usize,
    ) -> Vec<(Document, f64)> {
        let communities = self.retrieve_communities(query, top_k_communities);
        if communities.is_empty() {
            log::debug!("No community matched '{}', searching the whole corpus", query);
            return self.fallback_index().search(query, top_k_total);
        }

        let ids: Vec<CommunityId> = communities.iter().map(|c| c.community_id).collect();
        let mut hits = self.retrieve_from_communities(query, &ids, top_k_per_community);
        log::debug!(
            "Communities {:?} produced {} hits for '{}'",
            ids,
            hits.len(),
            query
        );
        hits.truncate(top_k_total);
        hits
    }

    /// Blend community-first sparse hits with precomputed dense hits
    ///
    /// The sparse side asks for `2 * top_k` documents.
    pub fn hybrid_retrieve(
        &self,
        query: &str,
        dense_results: &[(Document, f64)],
        top_k_communities: usize,
        top_k_per_community: usize,
        alpha: f64,
        top_k: usize,
    ) -> Vec<RankedCandidate> {
        let sparse = self.retrieve(
            query,
            top_k_communities,
            top_k_per_community,
            top_k.saturating_mul(2),
        );
        fuse_hybrid(dense_results, &sparse, alpha, top_k)
    }

    fn fallback_index(&self) -> &SparseIndex {
        self.fallback.get_or_init(|| {
            SparseIndex::build_with(self.documents.iter().cloned(), self.tokenizer, self.params)
        })
    }
}

fn summary_metadata(id: CommunityId) -> DocumentMetadata {
    DocumentMetadata::synthetic(format!("community:{id}")).with("community_id", id)
}

/// Map each document to the first community with a member matching its `source`
///
/// An exact id match wins; otherwise communities are scanned in ascending id order and
/// members in sorted order, matching on path suffix/prefix or on the file part of
/// `file:name` ids.
fn assign_documents(
    communities: &BTreeMap<CommunityId, Vec<String>>,
    documents: &[Document],
) -> BTreeMap<CommunityId, Vec<Document>> {
    let exact: HashMap<&str, CommunityId> = communities
        .iter()
        .flat_map(|(id, members)| members.iter().map(move |m| (m.as_str(), *id)))
        .collect();

    let mut assigned: BTreeMap<CommunityId, Vec<Document>> = BTreeMap::new();
    for document in documents {
        let source = document.source();
        let community = exact.get(source).copied().or_else(|| {
            communities.iter().find_map(|(id, members)| {
                members
                    .iter()
                    .any(|member| source_matches(source, member))
                    .then_some(*id)
            })
        });
        if let Some(id) = community {
            assigned.entry(id).or_default().push(document.clone());
        }
    }
    assigned
}

fn source_matches(source: &str, node_id: &str) -> bool {
    let overlaps = |path: &str| !path.is_empty() && (source.ends_with(path) || path.ends_with(source));
    if overlaps(node_id) {
        return true;
    }
    match node_id.split_once(':') {
        Some((file, _)) => overlaps(file),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn partition() -> Partition {
        Partition::from_groups(vec![
            vec!["src/cache.py".to_string(), "src/cache.py:evict".to_string()],
            vec!["src/net.py:retry".to_string()],
            vec!["README.md".to_string()],
        ])
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("evict least recently used cache entries", "src/cache.py").unwrap(),
            Document::new("retry failed requests with exponential backoff", "/repo/src/net.py")
                .unwrap(),
            Document::new("cache warmup at startup", "docs/cache-guide.md").unwrap(),
        ]
    }

    fn summaries() -> BTreeMap<CommunityId, String> {
        let mut summaries = BTreeMap::new();
        summaries.insert(0, "cache eviction and storage layer".to_string());
        summaries.insert(1, "network retry and backoff".to_string());
        summaries
    }

    #[test]
    fn documents_map_by_exact_suffix_and_file_part() {
        let retriever = CommunityFirstRetriever::new(&partition(), &summaries(), corpus());
        assert_eq!(retriever.community_documents(0).len(), 1);
        assert_eq!(retriever.community_documents(1)[0].source(), "/repo/src/net.py");
        assert!(retriever.community_documents(2).is_empty());
    }

    #[test]
    fn communities_rank_by_summary() {
        let retriever = CommunityFirstRetriever::new(&partition(), &summaries(), corpus());
        let matches = retriever.retrieve_communities("how does backoff work", 3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].community_id, 1);
        assert_eq!(matches[0].members, vec!["src/net.py:retry".to_string()]);
        assert!(matches[0].relevance_score > 0.0);
    }

    #[test]
    fn second_stage_stays_inside_selected_communities() {
        let retriever = CommunityFirstRetriever::new(&partition(), &summaries(), corpus());
        let hits = retriever.retrieve("cache eviction", 1, 5, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.source(), "src/cache.py");
    }

    #[test]
    fn unmatched_query_falls_back_to_the_corpus() {
        let retriever = CommunityFirstRetriever::new(&partition(), &summaries(), corpus());
        let hits = retriever.retrieve("warmup startup", 3, 5, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.source(), "docs/cache-guide.md");
    }

    #[test]
    fn no_summaries_means_flat_search() {
        let retriever = CommunityFirstRetriever::new(&partition(), &BTreeMap::new(), corpus());
        assert!(retriever.retrieve_communities("cache", 3).is_empty());
        assert_eq!(retriever.retrieve("cache", 3, 5, 10).len(), 2);
    }

    #[test]
    fn zero_budget_or_blank_query_is_empty() {
        let retriever = CommunityFirstRetriever::new(&partition(), &summaries(), corpus());
        assert!(retriever.retrieve("cache", 3, 5, 0).is_empty());
        assert!(retriever.retrieve("   ", 3, 5, 10).is_empty());
    }

    #[test]
    fn duplicates_across_communities_are_merged() {
        let docs = vec![
            Document::new("shared cache helper", "src/cache.py").unwrap(),
            Document::new("shared cache helper", "src/cache.py").unwrap(),
        ];
        let retriever = CommunityFirstRetriever::new(&partition(), &summaries(), docs);
        assert_eq!(retriever.community_documents(0).len(), 2);
        let hits = retriever.retrieve_from_communities("cache", &[0, 1, 2], 5);
        assert_eq!(hits.len(), 1);
    }
}

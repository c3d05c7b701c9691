//! # Atlas Search
//!
//! Retrieval over a document corpus that has been mapped onto code communities.
//!
//! ```text
//! query ──> community summaries (BM25) ──> top communities
//!              │                                │
//!              │ no match                       └──> per-community BM25 ──┐
//!              └──> flat BM25 over the corpus ───────────────────────────┤
//!                                                                         ▼
//!                         dense hits ──> hybrid fusion (min-max, alpha blend)
//!                                                    │
//!                                                    └──> MMR ──> context fragments
//! ```
//!
//! The category planner is the multi-corpus variant of hybrid fusion: each category
//! (e.g. `code`, `text`) brings its own dense backend and BM25 index.

mod bm25;
mod community;
mod config;
mod dense;
mod document;
mod error;
mod fusion;
mod mmr;
mod planner;
mod tokenizer;

pub use bm25::{Bm25Params, SparseIndex};
pub use community::{CommunityFirstRetriever, CommunityMatch};
pub use config::{CommunityConfig, HybridConfig, MmrConfig, PlannerConfig, RetrievalConfig};
pub use dense::{DenseRetriever, PrecomputedDense};
pub use document::{document_key, Document, DocumentMetadata, CATEGORY_KEY, UNKNOWN_CATEGORY};
pub use error::{Result, SearchError};
pub use fusion::{fuse_hybrid, normalize_scores, RankedCandidate};
pub use mmr::MmrSelector;
pub use planner::{collect_sources, format_context, CandidatePlanner, CategoryUnit};
pub use tokenizer::{default_tokenizer, Tokenizer};

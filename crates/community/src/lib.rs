//! # Atlas Community
//!
//! Groups the nodes of an entity graph into communities of closely related code and
//! attaches short natural-language summaries to them.
//!
//! ```text
//! EntityGraph ──> Projection (undirected, unit weights, no self-loops)
//!                    │
//!                    └──> Leiden (local moving → refinement → aggregation)
//!                            │
//!                            └──> Partition ──> CommunitySummarizer ──> CommunitySnapshot
//! ```

mod detector;
mod error;
mod leiden;
mod partition;
mod projection;
mod summarizer;

pub use detector::CommunityDetector;
pub use error::{CommunityError, Result};
pub use leiden::{leiden, modularity, LeidenConfig};
pub use partition::{Community, CommunityId, CommunitySnapshot, Partition};
pub use projection::Projection;
pub use summarizer::{CommunitySummarizer, SummarizerConfig, TextGenerator};

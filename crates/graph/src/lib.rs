//! # Atlas Graph
//!
//! Entity graph of a source repository: files, functions and classes connected by
//! containment and call edges.
//!
//! ## Architecture
//!
//! ```text
//! SourceFile[] (path, language tag, bytes)
//!     │
//!     ├──> tree-sitter parsing (one tree per file, reused by both passes)
//!     │
//!     ├──> Pass 1: nodes
//!     │      ├─ File node per file
//!     │      └─ Function / Class nodes (`path:name`) + Contains edges
//!     │
//!     └──> Pass 2: edges
//!            └─ Calls edges, resolved by simple name across the whole graph
//! ```
//!
//! Call resolution is name-based: a call to `save` links to every function named `save`
//! in any file, so one call site may produce zero, one or several edges.

mod builder;
mod error;
mod graph;
mod language;
mod types;

pub use builder::{BuildReport, GraphBuild, GraphBuilder, SourceFile};
pub use error::{GraphError, Result};
pub use language::GraphLanguage;
pub use types::{
    entity_id, EdgeKind, EdgeRecord, EntityEdge, EntityGraph, EntityKind, EntityNode,
    GraphSnapshot,
};

pub use petgraph::graph::NodeIndex;

//! Shared identity, document, and graph types for Folio.
//!
//! This crate is the leaf of the workspace: typed IDs, documents and blocks,
//! relationship-graph wire types, and the persistence response envelope. It
//! has **no internal folio dependencies**.
//!
//! # Overview
//!
//! ```text
//! Document (DocumentId)
//!     └── ordered Blocks (BlockId, fractional order_key)
//!     └── tags → Tag nodes in the relationship graph
//!
//! GraphData
//!     └── GraphNode (document | tag)
//!     └── GraphEdge (document-document | document-tag)
//! ```
//!
//! # Key Types
//!
//! |------------------------|------------------------------------------------|
//! | Type                   | Purpose                                        |
//! |------------------------|------------------------------------------------|
//! | [`DocumentId`]         | Which document                                 |
//! | [`BlockId`]            | Which block                                    |
//! | [`Document`]           | Title, status, tags, ordered blocks            |
//! | [`Block`]              | Text content + order key + indexing status     |
//! | [`GraphData`]          | Full node/edge snapshot                        |
//! | [`DocumentGraphDelta`] | What a save returns for the graph              |
//! | [`EdgeChanges`]        | Pushed document-document edge updates          |
//! | [`Response`]           | `{ success, data, message }` envelope          |
//! |------------------------|------------------------------------------------|

pub mod document;
pub mod graph;
pub mod ids;
pub mod response;

pub use document::{
    Block, Document, DocumentStatus, IndexStatus, UNTITLED_LABEL, UnknownStatusCode,
};
pub use graph::{
    DocumentGraphDelta, EdgeChanges, EdgeKind, GraphData, GraphEdge, GraphNode, NodeId, NodeKind,
    TAG_NODE_PREFIX,
};
pub use ids::{BlockId, DocumentId};
pub use response::Response;

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

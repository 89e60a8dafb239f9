//! Saving and syncing Folio documents.
//!
//! Sits between the editor (`folio-doc`) and a storage backend reached
//! through the [`Persistence`] trait. Everything here is async and shares
//! state behind cheap-to-clone handles.
//!
//! # Key Types
//!
//! |-------------------------|-----------------------------------------------|
//! | Type                    | Purpose                                       |
//! |-------------------------|-----------------------------------------------|
//! | [`SaveScheduler`]       | Debounced, coalescing per-document saves      |
//! | [`SaveStatusTracker`]   | idle / saving / indexing indicator            |
//! | [`GraphStore`]          | Incrementally merged relationship graph       |
//! | [`Persistence`]         | Storage backend seam                          |
//! | [`MemoryStore`]         | In-process backend for tests and replays      |
//! | [`SyncConfig`]          | Debounce and indexing-hold timings (RON)      |
//! |-------------------------|-----------------------------------------------|

pub mod config;
mod error;
mod fingerprint;
pub mod graph;
mod lifecycle;
mod memory;
mod persistence;
mod scheduler;
pub mod status;

pub use config::{ConfigError, SyncConfig};
pub use error::{PersistenceError, SyncError};
pub use fingerprint::Fingerprint;
pub use graph::{GraphStore, SharedGraph};
pub use lifecycle::CloseOutcome;
pub use memory::MemoryStore;
pub use persistence::Persistence;
pub use scheduler::{SaveEvent, SaveScheduler};
pub use status::{SaveActivity, SaveStatus, SaveStatusTracker};

/// Result type for save and lifecycle operations.
pub type Result<T> = std::result::Result<T, SyncError>;

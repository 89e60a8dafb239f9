//! Error types for saving and syncing documents.

use thiserror::Error;

use folio_types::DocumentId;

use crate::config::ConfigError;

/// Failure reaching the storage backend.
///
/// A backend that answers with `success == false` is not a transport
/// failure; that surfaces as [`SyncError::Rejected`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend unavailable")]
    Unavailable,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors surfaced by the save scheduler and document lifecycle.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The backend answered but refused the operation.
    #[error("backend rejected {document_id}: {message}")]
    Rejected {
        document_id: DocumentId,
        message: String,
    },

    /// The backend refused to hand out the graph snapshot.
    #[error("graph unavailable: {0}")]
    GraphUnavailable(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub(crate) fn rejected(document_id: DocumentId, message: Option<String>) -> Self {
        SyncError::Rejected {
            document_id,
            message: message.unwrap_or_else(|| "no message".to_string()),
        }
    }
}

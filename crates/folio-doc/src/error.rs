//! Error types for document editing operations.

use thiserror::Error;

use folio_types::BlockId;

/// Errors that can occur while editing a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocError {
    /// Block not found in document.
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// A focus-relative operation ran while no block had focus.
    #[error("no block has focus")]
    NoFocus,
}

//! Editing model for Folio documents.
//!
//! A document is an ordered list of text blocks. This crate owns everything
//! that changes that list in response to the editor, without any I/O:
//!
//! - **order**: fractional order keys, bisecting on insert and renormalizing
//!   when the float gap runs out
//! - **focus**: the key-event state machine that moves focus across block
//!   boundaries, splits blocks on Enter and removes empty blocks on Backspace
//! - **session**: an [`EditingSession`] holding the open document and the
//!   focused block, applying focus transitions to the document
//!
//! Persistence and debounced saving live in `folio-sync`.

mod error;
pub mod focus;
pub mod order;
mod session;

pub use error::DocError;
pub use focus::{
    Caret, CaretContext, FocusState, Key, KeyEvent, Modifiers, Transition, next_transition,
};
pub use session::{EditingSession, KeyOutcome};

/// Result type for editing operations.
pub type Result<T> = std::result::Result<T, DocError>;

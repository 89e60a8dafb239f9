//! Scripted replays of editing sessions.
//!
//! Drives the editing session and save scheduler from a RON script against
//! an in-memory backend, so debounce, coalescing and graph behaviour can be
//! observed end to end without an editor.

pub mod script;

pub use script::{ReplayReport, Script, Step, run};

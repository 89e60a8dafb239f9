//! Focus navigation across block boundaries.
//!
//! The text widget owns the caret inside a block. When a key would carry the
//! caret past the block's edge (or split/merge blocks), the widget asks
//! [`next_transition`] what to do. The machine is purely reactive: its only
//! state is the [`FocusState`] it hands back.
//!
//! ```text
//!   Enter (modifier)                  → InsertAfter
//!   Enter on empty / blank tail       → InsertAfter (trim blank tail)
//!   Backspace on empty block          → Remove, focus previous at End
//!   ArrowUp on first line             → Focus previous, last line, same column
//!   ArrowDown on last line            → Focus next, first line, same column
//!   anything else                     → Native
//! ```

use serde::{Deserialize, Serialize};

use folio_types::{Block, BlockId};

use crate::{DocError, Result};

/// Keys the machine reacts to. Everything else is `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Backspace,
    ArrowUp,
    ArrowDown,
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// A key press with no modifiers.
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_shift(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::NONE
            },
        }
    }
}

/// Where the caret sits inside the block that received the key.
///
/// Normally supplied by the widget; [`CaretContext::from_text`] derives it
/// from plain block text for hosts that track the caret themselves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretContext {
    /// Block has no content at all.
    pub block_empty: bool,
    /// The caret's line is blank.
    pub current_line_blank: bool,
    /// Everything from the caret to the end of the block is blank.
    pub following_lines_blank: bool,
    pub first_line: bool,
    pub last_line: bool,
    /// Zero-based line index of the caret.
    pub line: usize,
    /// Caret column within its line, in chars.
    pub column: usize,
}

impl CaretContext {
    /// Derive the caret facts from block text. `line` and `column` are
    /// clamped to the text.
    pub fn from_text(text: &str, line: usize, column: usize) -> Self {
        let lines: Vec<&str> = text.split('\n').collect();
        let last = lines.len() - 1;
        let line = line.min(last);
        let current = lines[line];
        let column = column.min(current.chars().count());

        let rest_of_line: String = current.chars().skip(column).collect();
        let following_lines_blank = rest_of_line.trim().is_empty()
            && lines[line + 1..].iter().all(|l| l.trim().is_empty());

        Self {
            block_empty: text.is_empty(),
            current_line_blank: current.trim().is_empty(),
            following_lines_blank,
            first_line: line == 0,
            last_line: line == last,
            line,
            column,
        }
    }
}

/// Caret placement for the block that gains focus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Caret {
    Start,
    /// After the last character.
    End,
    /// On the last line at `column` (arriving from the block below).
    LastLine { column: usize },
    /// On the first line at `column` (arriving from the block above).
    FirstLine { column: usize },
}

impl Caret {
    /// Sentinel offset understood by widgets as "end of content".
    pub const END_OF_CONTENT: i64 = 99_999_999_999;

    /// Absolute char offset of this placement within `text`.
    pub fn resolve(&self, text: &str) -> usize {
        match *self {
            Caret::Start => 0,
            Caret::End => text.chars().count(),
            Caret::FirstLine { column } => {
                let first = text.split('\n').next().unwrap_or("");
                column.min(first.chars().count())
            }
            Caret::LastLine { column } => {
                let (head, last) = match text.rfind('\n') {
                    Some(pos) => (&text[..=pos], &text[pos + 1..]),
                    None => ("", text),
                };
                head.chars().count() + column.min(last.chars().count())
            }
        }
    }
}

/// Which block has focus and where its caret goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusState {
    pub block_id: BlockId,
    pub caret: Caret,
}

impl FocusState {
    pub fn new(block_id: BlockId, caret: Caret) -> Self {
        Self { block_id, caret }
    }
}

/// Outcome of a key event at a block boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Not ours; the widget handles the keystroke.
    Native,
    /// Key consumed but nothing changes (e.g. ArrowUp on the first block).
    Noop,
    /// Insert an empty block after `after` and focus it at the start.
    /// With `trim_from_line`, the block is first cut back to the lines
    /// before that index.
    InsertAfter {
        after: BlockId,
        trim_from_line: Option<usize>,
    },
    /// Remove `block` and move focus.
    Remove { block: BlockId, focus: FocusState },
    /// Move focus without changing the document.
    Focus(FocusState),
}

/// Decide the transition for `event` pressed in block `current`.
pub fn next_transition(
    blocks: &[Block],
    current: &BlockId,
    event: &KeyEvent,
    caret: &CaretContext,
) -> Result<Transition> {
    let idx = blocks
        .iter()
        .position(|b| b.id == *current)
        .ok_or(DocError::BlockNotFound(*current))?;

    let transition = match event.key {
        Key::Enter if event.modifiers.any() => Transition::InsertAfter {
            after: *current,
            trim_from_line: None,
        },
        Key::Enter if caret.block_empty => Transition::InsertAfter {
            after: *current,
            trim_from_line: None,
        },
        Key::Enter if caret.current_line_blank && caret.following_lines_blank => {
            Transition::InsertAfter {
                after: *current,
                trim_from_line: Some(caret.line),
            }
        }
        Key::Backspace if caret.block_empty => {
            if blocks.len() < 2 {
                Transition::Noop
            } else {
                let focus = match idx.checked_sub(1) {
                    Some(prev) => FocusState::new(blocks[prev].id, Caret::End),
                    None => FocusState::new(blocks[idx + 1].id, Caret::Start),
                };
                Transition::Remove {
                    block: *current,
                    focus,
                }
            }
        }
        Key::ArrowUp if caret.first_line => match idx.checked_sub(1) {
            Some(prev) => Transition::Focus(FocusState::new(
                blocks[prev].id,
                Caret::LastLine {
                    column: caret.column,
                },
            )),
            None => Transition::Noop,
        },
        Key::ArrowDown if caret.last_line => match blocks.get(idx + 1) {
            Some(next) => Transition::Focus(FocusState::new(
                next.id,
                Caret::FirstLine {
                    column: caret.column,
                },
            )),
            None => Transition::Noop,
        },
        _ => Transition::Native,
    };

    Ok(transition)
}

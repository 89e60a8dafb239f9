//! The editing session: one open document plus the block that has focus.
//!
//! All document mutations made by the editor go through here, so the block
//! list is always swapped in as a whole and focus never points at a block
//! that no longer exists.

use folio_types::{BlockId, Document};

use crate::focus::{self, Caret, CaretContext, FocusState, KeyEvent, Transition};
use crate::{order, DocError, Result};

/// What the host should do after a key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Let the text widget process the key itself.
    Native,
    /// The session consumed the key. When `document_changed` is set the
    /// host schedules an auto-save.
    Handled { document_changed: bool },
}

impl KeyOutcome {
    pub fn document_changed(&self) -> bool {
        matches!(self, KeyOutcome::Handled { document_changed: true })
    }
}

#[derive(Debug)]
pub struct EditingSession {
    document: Document,
    focus: Option<FocusState>,
}

impl EditingSession {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            focus: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Swap in another document (tab switch or reload). Focus is dropped.
    pub fn replace_document(&mut self, document: Document) {
        self.document = document;
        self.focus = None;
    }

    pub fn focus(&self) -> Option<FocusState> {
        self.focus
    }

    pub fn set_focus(&mut self, focus: FocusState) -> Result<()> {
        if self.document.block(&focus.block_id).is_none() {
            return Err(DocError::BlockNotFound(focus.block_id));
        }
        self.focus = Some(focus);
        Ok(())
    }

    /// Replace a block's text. Returns whether anything changed.
    pub fn update_block_content(&mut self, id: &BlockId, content: impl Into<String>) -> Result<bool> {
        let content = content.into();
        let block = self
            .document
            .block_mut(id)
            .ok_or(DocError::BlockNotFound(*id))?;
        if block.text() == content {
            return Ok(false);
        }
        block.content = Some(content);
        Ok(true)
    }

    pub fn set_title(&mut self, title: Option<String>) -> bool {
        if self.document.title == title {
            return false;
        }
        self.document.title = title;
        true
    }

    pub fn set_tags(&mut self, tags: Option<Vec<String>>) -> bool {
        if self.document.tags == tags {
            return false;
        }
        self.document.tags = tags;
        true
    }

    /// Insert an empty block after `after` and focus it at the start.
    pub fn insert_block_after(&mut self, after: &BlockId) -> Result<BlockId> {
        let (block, blocks) = order::insert_after(&self.document.blocks, after)?;
        self.document.blocks = blocks;
        self.focus = Some(FocusState::new(block.id, Caret::Start));
        Ok(block.id)
    }

    /// Remove a block. Returns `false` when it was the only one left.
    pub fn remove_block(&mut self, id: &BlockId) -> Result<bool> {
        let before = self.document.blocks.len();
        self.document.blocks = order::remove(&self.document.blocks, id)?;
        let removed = self.document.blocks.len() < before;
        if removed && self.focus.is_some_and(|f| f.block_id == *id) {
            self.focus = None;
        }
        Ok(removed)
    }

    /// Route a key pressed in `block_id` through the focus machine and
    /// apply the resulting transition.
    #[tracing::instrument(name = "focus.handle_key", skip_all, fields(block = %block_id, key = ?event.key))]
    pub fn handle_key(
        &mut self,
        block_id: &BlockId,
        event: &KeyEvent,
        caret: &CaretContext,
    ) -> Result<KeyOutcome> {
        let transition = focus::next_transition(&self.document.blocks, block_id, event, caret)?;
        tracing::trace!(?transition, "focus transition");
        self.apply(transition)
    }

    /// Like [`handle_key`](Self::handle_key) for whichever block has focus.
    pub fn handle_focused_key(&mut self, event: &KeyEvent, caret: &CaretContext) -> Result<KeyOutcome> {
        let current = self.focus.ok_or(DocError::NoFocus)?.block_id;
        self.handle_key(&current, event, caret)
    }

    fn apply(&mut self, transition: Transition) -> Result<KeyOutcome> {
        match transition {
            Transition::Native => Ok(KeyOutcome::Native),
            Transition::Noop => Ok(KeyOutcome::Handled {
                document_changed: false,
            }),
            Transition::InsertAfter {
                after,
                trim_from_line,
            } => {
                if let Some(line) = trim_from_line {
                    self.trim_lines(&after, line)?;
                }
                self.insert_block_after(&after)?;
                Ok(KeyOutcome::Handled {
                    document_changed: true,
                })
            }
            Transition::Remove { block, focus } => {
                let removed = self.remove_block(&block)?;
                self.focus = Some(focus);
                Ok(KeyOutcome::Handled {
                    document_changed: removed,
                })
            }
            Transition::Focus(focus) => {
                self.focus = Some(focus);
                Ok(KeyOutcome::Handled {
                    document_changed: false,
                })
            }
        }
    }

    /// Cut a block back to the lines before `line`.
    fn trim_lines(&mut self, id: &BlockId, line: usize) -> Result<()> {
        let block = self
            .document
            .block_mut(id)
            .ok_or(DocError::BlockNotFound(*id))?;
        let kept: Vec<&str> = block.text().split('\n').take(line).collect();
        let trimmed = kept.join("\n");
        if trimmed != block.text() {
            block.content = Some(trimmed);
        }
        Ok(())
    }
}

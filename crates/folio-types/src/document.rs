//! Documents and the text blocks they are made of.
//!
//! A [`Document`] is an ordered sequence of [`Block`]s. Display order is the
//! `Vec` order, and `order_key` must agree with it (strictly increasing).
//! The types here are plain data; ordering policy lives in `folio-doc`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, DocumentId};

/// Label used for documents without a title.
pub const UNTITLED_LABEL: &str = "Untitled";

/// A numeric status code that does not map to a known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown status code {0}")]
pub struct UnknownStatusCode(pub u8);

/// Lifecycle status of a document. Serialized as its numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString)]
#[serde(into = "u8", try_from = "u8")]
#[strum(ascii_case_insensitive)]
pub enum DocumentStatus {
    /// Quick capture, not yet curated.
    #[default]
    Fleeting,
    /// Kept note.
    Permanent,
    /// Hidden from the default listing.
    Archived,
}

impl DocumentStatus {
    /// Numeric code used by the persistence layer.
    pub fn code(&self) -> u8 {
        match self {
            DocumentStatus::Fleeting => 0,
            DocumentStatus::Permanent => 1,
            DocumentStatus::Archived => 99,
        }
    }

    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }
}

impl From<DocumentStatus> for u8 {
    fn from(status: DocumentStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for DocumentStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(DocumentStatus::Fleeting),
            1 => Ok(DocumentStatus::Permanent),
            99 => Ok(DocumentStatus::Archived),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

/// Background indexing state of a block, owned by the external indexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString)]
#[serde(into = "u8", try_from = "u8")]
#[strum(ascii_case_insensitive)]
pub enum IndexStatus {
    #[default]
    Pending,
    Indexed,
    Failed,
}

impl IndexStatus {
    pub fn code(&self) -> u8 {
        match self {
            IndexStatus::Pending => 0,
            IndexStatus::Indexed => 1,
            IndexStatus::Failed => 2,
        }
    }
}

impl From<IndexStatus> for u8 {
    fn from(status: IndexStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for IndexStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(IndexStatus::Pending),
            1 => Ok(IndexStatus::Indexed),
            2 => Ok(IndexStatus::Failed),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

/// One text block inside a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub document_id: DocumentId,
    /// Text content. `None` and `Some("")` both mean empty.
    pub content: Option<String>,
    /// Fractional position token; strictly increasing in display order.
    pub order_key: f64,
    /// Document this block was quoted from, if any.
    pub source_document_id: Option<DocumentId>,
    pub index_status: IndexStatus,
}

impl Block {
    /// Create an empty block with a fresh id.
    pub fn new(document_id: DocumentId, order_key: f64) -> Self {
        Self {
            id: BlockId::new(),
            document_id,
            content: None,
            order_key,
            source_document_id: None,
            index_status: IndexStatus::Pending,
        }
    }

    /// Set the content (builder style).
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Content as a string slice (empty when `None`).
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// True when the content is absent or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}

/// A note: optional title, optional tags, and at least one block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub title: Option<String>,
    pub status: DocumentStatus,
    pub tags: Option<Vec<String>>,
    pub blocks: Vec<Block>,
}

impl Document {
    /// A fresh, untitled document holding a single empty block.
    pub fn new() -> Self {
        Self::with_id(DocumentId::new())
    }

    /// Like [`Document::new`] but with a caller-chosen id.
    pub fn with_id(id: DocumentId) -> Self {
        Self {
            id,
            title: None,
            status: DocumentStatus::Fleeting,
            tags: None,
            blocks: vec![Block::new(id, 0.0)],
        }
    }

    /// True when the title is blank and every block is blank.
    ///
    /// Blank documents are still persisted but never counted as user-visible
    /// save activity.
    pub fn is_blank(&self) -> bool {
        let title_blank = self
            .title
            .as_deref()
            .map(|t| t.trim().is_empty())
            .unwrap_or(true);
        title_blank && self.blocks.iter().all(Block::is_blank)
    }

    /// Title for display, falling back to [`UNTITLED_LABEL`].
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => UNTITLED_LABEL,
        }
    }

    /// Position of a block in display order.
    pub fn block_index(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == *id)
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == *id)
    }

    pub fn block_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == *id)
    }

    /// Tags as a slice (empty when `None`).
    pub fn tag_list(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_one_empty_block() {
        let doc = Document::new();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].document_id, doc.id);
        assert_eq!(doc.blocks[0].order_key, 0.0);
        assert!(doc.is_blank());
        assert_eq!(doc.label(), UNTITLED_LABEL);
    }

    #[test]
    fn test_is_blank_considers_title_and_blocks() {
        let mut doc = Document::new();
        doc.title = Some("   ".into());
        assert!(doc.is_blank());

        doc.title = Some("Groceries".into());
        assert!(!doc.is_blank());

        doc.title = None;
        doc.blocks[0].content = Some("\n  \n".into());
        assert!(doc.is_blank());

        doc.blocks[0].content = Some("milk".into());
        assert!(!doc.is_blank());
    }

    #[test]
    fn test_status_serializes_as_numeric_code() {
        assert_eq!(serde_json::to_string(&DocumentStatus::Archived).unwrap(), "99");
        let parsed: DocumentStatus = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, DocumentStatus::Permanent);
        assert!(serde_json::from_str::<DocumentStatus>("7").is_err());
    }

    #[test]
    fn test_status_parses_case_insensitive() {
        assert_eq!(DocumentStatus::from_str("PERMANENT"), Some(DocumentStatus::Permanent));
        assert_eq!(DocumentStatus::from_str("nope"), None);
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = Document::new();
        let value = serde_json::to_value(&doc).unwrap();
        let block = &value["blocks"][0];
        assert!(block.get("orderKey").is_some());
        assert!(block.get("documentId").is_some());
        assert_eq!(block["indexStatus"], 0);
    }

    #[test]
    fn test_block_lookup() {
        let mut doc = Document::new();
        let id = doc.blocks[0].id;
        assert_eq!(doc.block_index(&id), Some(0));
        doc.block_mut(&id).unwrap().content = Some("hi".into());
        assert_eq!(doc.block(&id).unwrap().text(), "hi");
        assert_eq!(doc.block_index(&BlockId::new()), None);
    }
}

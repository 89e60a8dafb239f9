//! Content fingerprints for change detection.

use serde::Serialize;

use folio_types::{Block, Document, DocumentId};

/// Stable serialization of the parts of a document a save cares about:
/// id, title, tags, and the ordered blocks. Status is excluded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

#[derive(Serialize)]
struct Fingerprinted<'a> {
    id: &'a DocumentId,
    title: &'a Option<String>,
    tags: &'a Option<Vec<String>>,
    blocks: &'a [Block],
}

impl Fingerprint {
    pub fn of(document: &Document) -> Self {
        let view = Fingerprinted {
            id: &document.id,
            title: &document.title,
            tags: &document.tags,
            blocks: &document.blocks,
        };
        // Only string-keyed structs here; to_string cannot fail.
        Self(serde_json::to_string(&view).unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//! The storage backend seam.

use async_trait::async_trait;

use folio_types::{Document, DocumentGraphDelta, DocumentId, GraphData, Response};

use crate::error::PersistenceError;

/// Storage backend for documents.
///
/// `Err` means the call never got an answer. A returned [`Response`] with
/// `success == false` is a rejection from a reachable backend.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Persist a document and return the graph changes it produced.
    async fn save(&self, document: &Document)
    -> Result<Response<DocumentGraphDelta>, PersistenceError>;

    async fn delete(&self, id: DocumentId) -> Result<Response<DocumentId>, PersistenceError>;

    async fn load(&self, id: DocumentId) -> Result<Response<Document>, PersistenceError>;

    /// Full relationship graph, fetched once at startup.
    async fn load_graph(&self) -> Result<Response<GraphData>, PersistenceError>;
}

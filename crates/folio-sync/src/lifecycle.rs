//! Document lifecycle driven by the tab bar: create, switch away, close.

use serde::Serialize;

use folio_types::{Document, DocumentId};

use crate::error::SyncError;
use crate::scheduler::SaveScheduler;

/// What closing a document did to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseOutcome {
    Kept,
    /// Blank or already gone; removed from storage and the graph.
    Deleted,
}

impl SaveScheduler {
    /// Create an empty document and persist it right away.
    #[tracing::instrument(name = "lifecycle.create", skip(self))]
    pub async fn create_document(&self) -> Result<Document, SyncError> {
        let document = Document::new();
        self.save_immediate(&document).await?;
        tracing::info!(document = %document.id, "document created");
        Ok(document)
    }

    /// Flush outstanding edits, then delete the document if it ended up
    /// blank or no longer exists in storage.
    #[tracing::instrument(name = "lifecycle.close", skip_all, fields(document = %id))]
    pub async fn close_document(&self, id: DocumentId) -> Result<CloseOutcome, SyncError> {
        self.flush_save(Some(id)).await?;

        let stored = self.persistence().load(id).await?.into_data();
        match stored {
            Some(document) if !document.is_blank() => return Ok(CloseOutcome::Kept),
            Some(_) => {
                let response = self.persistence().delete(id).await?;
                if !response.success {
                    return Err(SyncError::rejected(id, response.message));
                }
                tracing::info!("blank document deleted on close");
            }
            None => tracing::debug!("closed document already gone from storage"),
        }

        self.on_document_deleted(id);
        Ok(CloseOutcome::Deleted)
    }

    /// Leaving a document for another tab: flush every pending save.
    #[tracing::instrument(name = "lifecycle.switch", skip(self))]
    pub async fn switch_away(&self) -> Result<(), SyncError> {
        self.flush_save(None).await
    }

    /// A document was deleted (here or elsewhere). Drops its save task and
    /// ledger entry and prunes it from the graph.
    pub fn on_document_deleted(&self, id: DocumentId) -> bool {
        self.forget(id);
        self.graph().write().remove_document_from_graph(id)
    }

    /// Fetch the full graph and install it as the starting snapshot.
    #[tracing::instrument(name = "lifecycle.load_graph", skip(self))]
    pub async fn load_graph(&self) -> Result<(), SyncError> {
        let response = self.persistence().load_graph().await?;
        if !response.success {
            return Err(SyncError::GraphUnavailable(
                response.message.unwrap_or_else(|| "no message".to_string()),
            ));
        }
        let data = response.data.unwrap_or_default();
        tracing::info!(nodes = data.nodes.len(), edges = data.edges.len(), "graph loaded");
        self.graph().write().load(data);
        Ok(())
    }
}

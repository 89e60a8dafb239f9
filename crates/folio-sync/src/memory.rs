//! In-memory storage backend.
//!
//! Used by tests and `folio-replay`. All data is ephemeral. Every save is
//! recorded so callers can assert on what was persisted and in which order,
//! and faults can be queued to exercise failure paths.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use folio_types::{
    Document, DocumentGraphDelta, DocumentId, GraphData, GraphEdge, GraphNode, NodeId, Response,
};

use crate::error::PersistenceError;
use crate::persistence::Persistence;

/// Outcome queued for an upcoming save.
#[derive(Debug, Clone)]
enum Fault {
    Transport(PersistenceError),
    Reject(String),
}

/// In-memory [`Persistence`]. Thread-safe via internal locks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
    /// Every successfully saved version, in save order.
    saves: Mutex<Vec<Document>>,
    /// Document–document edges reported by `load_graph`.
    links: RwLock<Vec<GraphEdge>>,
    faults: Mutex<VecDeque<Fault>>,
    deletes: Mutex<Vec<DocumentId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored document without recording a save.
    pub fn insert(&self, document: Document) {
        self.documents.write().insert(document.id, document);
    }

    /// Add a document–document edge to the graph snapshot.
    pub fn link(&self, source: DocumentId, target: DocumentId, weight: Option<f64>) {
        self.links
            .write()
            .push(GraphEdge::document_document(source, target, weight));
    }

    pub fn document(&self, id: DocumentId) -> Option<Document> {
        self.documents.read().get(&id).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().len()
    }

    /// Saved versions of one document, oldest first.
    pub fn saves_of(&self, id: DocumentId) -> Vec<Document> {
        self.saves
            .lock()
            .iter()
            .filter(|d| d.id == id)
            .cloned()
            .collect()
    }

    pub fn deleted(&self) -> Vec<DocumentId> {
        self.deletes.lock().clone()
    }

    /// Fail the next save with a transport error.
    pub fn fail_next_save(&self, error: PersistenceError) {
        self.faults.lock().push_back(Fault::Transport(error));
    }

    /// Answer the next save with `success == false`.
    pub fn reject_next_save(&self, message: impl Into<String>) {
        self.faults.lock().push_back(Fault::Reject(message.into()));
    }

    fn graph_snapshot(&self) -> GraphData {
        let documents = self.documents.read();
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut edges: Vec<GraphEdge> = Vec::new();
        let mut seen_tags: Vec<NodeId> = Vec::new();

        for document in documents.values() {
            let delta = DocumentGraphDelta::for_document(document);
            nodes.push(delta.document_node);
            for tag in delta.tag_nodes {
                if !seen_tags.contains(&tag.id) {
                    seen_tags.push(tag.id.clone());
                    nodes.push(tag);
                }
            }
            edges.extend(delta.tag_edges);
        }
        edges.extend(self.links.read().iter().cloned());
        GraphData { nodes, edges }
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn save(
        &self,
        document: &Document,
    ) -> Result<Response<DocumentGraphDelta>, PersistenceError> {
        let fault = self.faults.lock().pop_front();
        match fault {
            Some(Fault::Transport(e)) => return Err(e),
            Some(Fault::Reject(message)) => return Ok(Response::rejected(message)),
            None => {}
        }
        self.documents.write().insert(document.id, document.clone());
        self.saves.lock().push(document.clone());
        Ok(Response::ok(DocumentGraphDelta::for_document(document)))
    }

    async fn delete(&self, id: DocumentId) -> Result<Response<DocumentId>, PersistenceError> {
        if self.documents.write().remove(&id).is_none() {
            return Ok(Response::rejected(format!("document not found: {id}")));
        }
        let node = NodeId::from(id);
        self.links.write().retain(|e| !(e.source == node || e.target == node));
        self.deletes.lock().push(id);
        Ok(Response::ok(id))
    }

    async fn load(&self, id: DocumentId) -> Result<Response<Document>, PersistenceError> {
        Ok(match self.document(id) {
            Some(document) => Response::ok(document),
            None => Response::rejected(format!("document not found: {id}")),
        })
    }

    async fn load_graph(&self) -> Result<Response<GraphData>, PersistenceError> {
        Ok(Response::ok(self.graph_snapshot()))
    }
}

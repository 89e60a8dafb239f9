//! Incrementally maintained relationship graph.
//!
//! The full graph is fetched once ([`GraphStore::load`]); afterwards every
//! save merges a [`DocumentGraphDelta`] instead of refetching. Each update is
//! linear in nodes plus edges and leaves the store in a state where:
//!
//! - every edge's endpoints exist as nodes
//! - every tag node has at least one document→tag edge
//!
//! Until a snapshot is loaded every update is a no-op returning `false`.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use folio_types::{DocumentGraphDelta, DocumentId, EdgeChanges, GraphData, GraphEdge, GraphNode, NodeId};

/// Graph shared between the scheduler and readers.
pub type SharedGraph = Arc<RwLock<GraphStore>>;

#[derive(Debug, Default)]
pub struct GraphStore {
    loaded: bool,
    nodes: IndexMap<NodeId, GraphNode>,
    edges: Vec<GraphEdge>,
    last_updated: Option<u64>,
}

impl GraphStore {
    /// An unloaded store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedGraph {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Install a full snapshot, replacing whatever was there. Dangling edges
    /// and orphan tags in the snapshot are dropped.
    pub fn load(&mut self, data: GraphData) {
        self.nodes = data
            .nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        self.edges.clear();
        self.push_edges(data.edges);
        self.prune_orphan_tags();
        self.loaded = true;
        self.touch();
        tracing::debug!(nodes = self.nodes.len(), edges = self.edges.len(), "graph loaded");
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn snapshot(&self) -> Option<GraphData> {
        self.loaded.then(|| GraphData {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.clone(),
        })
    }

    /// Unix millis of the last applied change.
    pub fn last_updated(&self) -> Option<u64> {
        self.last_updated
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Merge the result of saving one document: its node and its current
    /// tag set. Document–document edges are left alone.
    #[tracing::instrument(name = "graph.upsert", skip_all, fields(document = %delta.document_id))]
    pub fn upsert_document_graph(&mut self, delta: DocumentGraphDelta) -> bool {
        if !self.loaded {
            return false;
        }
        let doc_node = NodeId::from(delta.document_id);

        self.edges
            .retain(|e| !(e.is_document_tag() && e.source == doc_node));

        let mut keep: HashSet<NodeId> = self
            .edges
            .iter()
            .filter(|e| e.is_document_tag())
            .map(|e| e.target.clone())
            .collect();
        keep.extend(delta.tag_nodes.iter().map(|n| n.id.clone()));

        self.nodes.insert(doc_node, delta.document_node);
        for tag in delta.tag_nodes {
            self.nodes.insert(tag.id.clone(), tag);
        }
        self.nodes.retain(|id, node| !node.is_tag() || keep.contains(id));

        self.push_edges(delta.tag_edges);
        // A delta may name a tag node without an edge for it.
        self.prune_orphan_tags();
        self.touch();
        true
    }

    /// Drop a document's node, every edge touching it, and tags left without
    /// any document.
    #[tracing::instrument(name = "graph.remove", skip(self))]
    pub fn remove_document_from_graph(&mut self, id: DocumentId) -> bool {
        if !self.loaded {
            return false;
        }
        let doc_node = NodeId::from(id);
        self.nodes.shift_remove(&doc_node);
        self.edges.retain(|e| !e.touches(&doc_node));
        self.prune_orphan_tags();
        self.touch();
        true
    }

    /// Apply pushed edge changes: removals by (source, target), then
    /// additions whose key is not already present.
    #[tracing::instrument(
        name = "graph.edges",
        skip_all,
        fields(added = changes.added_edges.len(), removed = changes.removed_edges.len())
    )]
    pub fn apply_edge_changes(&mut self, changes: EdgeChanges) -> bool {
        if !self.loaded {
            return false;
        }
        {
            let removed: HashSet<(&NodeId, &NodeId)> =
                changes.removed_edges.iter().map(GraphEdge::key).collect();
            self.edges.retain(|e| !removed.contains(&e.key()));
        }

        self.push_edges(changes.added_edges);
        self.prune_orphan_tags();
        self.touch();
        true
    }

    /// Append edges whose endpoints exist and whose key is new.
    fn push_edges(&mut self, incoming: Vec<GraphEdge>) {
        let mut present: HashSet<(NodeId, NodeId)> = self
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();
        for edge in incoming {
            if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
                tracing::debug!(source = %edge.source, target = %edge.target, "dropping dangling edge");
                continue;
            }
            if present.insert((edge.source.clone(), edge.target.clone())) {
                self.edges.push(edge);
            }
        }
    }

    fn prune_orphan_tags(&mut self) {
        let referenced: HashSet<&NodeId> = self
            .edges
            .iter()
            .filter(|e| e.is_document_tag())
            .map(|e| &e.target)
            .collect();
        let orphans: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.is_tag() && !referenced.contains(&n.id))
            .map(|n| n.id.clone())
            .collect();
        if orphans.is_empty() {
            return;
        }
        let orphans: HashSet<NodeId> = orphans.into_iter().collect();
        self.nodes.retain(|id, _| !orphans.contains(id));
        self.edges
            .retain(|e| !orphans.contains(&e.source) && !orphans.contains(&e.target));
    }

    fn touch(&mut self) {
        self.last_updated = Some(folio_types::now_millis());
    }
}

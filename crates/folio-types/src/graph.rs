//! Relationship graph wire types.
//!
//! Nodes are documents or tags; edges connect a document to another document
//! (similarity, links) or to a tag. Node ids are strings because tag ids are
//! not UUIDs: documents use their UUID text, tags use `tag:<name>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::DocumentId;

/// Prefix for tag node ids.
pub const TAG_NODE_PREFIX: &str = "tag:";

/// Graph node identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Node id for a tag name.
    pub fn tag(name: &str) -> Self {
        Self(format!("{TAG_NODE_PREFIX}{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<DocumentId> for NodeId {
    fn from(id: DocumentId) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Tag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    DocumentDocument,
    DocumentTag,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    #[serde(rename = "nodeType")]
    pub kind: NodeKind,
}

impl GraphNode {
    pub fn document(id: DocumentId, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Document,
        }
    }

    /// Tag node; the label is the bare tag name.
    pub fn tag(name: &str) -> Self {
        Self {
            id: NodeId::tag(name),
            label: name.to_string(),
            kind: NodeKind::Tag,
        }
    }

    pub fn is_tag(&self) -> bool {
        self.kind == NodeKind::Tag
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "edgeType")]
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl GraphEdge {
    /// Document → tag membership edge.
    pub fn document_tag(document: DocumentId, tag: &str) -> Self {
        Self {
            source: document.into(),
            target: NodeId::tag(tag),
            kind: EdgeKind::DocumentTag,
            weight: None,
        }
    }

    /// Document → document relationship edge.
    pub fn document_document(source: DocumentId, target: DocumentId, weight: Option<f64>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::DocumentDocument,
            weight,
        }
    }

    pub fn is_document_tag(&self) -> bool {
        self.kind == EdgeKind::DocumentTag
    }

    /// Identity of an edge for dedup and removal.
    pub fn key(&self) -> (&NodeId, &NodeId) {
        (&self.source, &self.target)
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        self.source == *node || self.target == *node
    }
}

/// Full graph snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// What a save returns: the document's node plus its current tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGraphDelta {
    pub document_id: DocumentId,
    pub document_node: GraphNode,
    pub tag_nodes: Vec<GraphNode>,
    pub tag_edges: Vec<GraphEdge>,
}

impl DocumentGraphDelta {
    /// Build the delta for a document from its title and tag list.
    pub fn for_document(document: &crate::Document) -> Self {
        let tags = document.tag_list();
        Self {
            document_id: document.id,
            document_node: GraphNode::document(document.id, document.label()),
            tag_nodes: tags.iter().map(|t| GraphNode::tag(t)).collect(),
            tag_edges: tags
                .iter()
                .map(|t| GraphEdge::document_tag(document.id, t))
                .collect(),
        }
    }
}

/// Externally pushed document–document edge changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeChanges {
    pub added_edges: Vec<GraphEdge>,
    pub removed_edges: Vec<GraphEdge>,
}

//! Host document and team-library capabilities consumed by the engine.
//!
//! The design tool owns the document tree, the library catalogs and the
//! viewport. The engine only sees it through [`DocumentHost`] and
//! [`LibraryHost`], so the discovery and insertion logic can run against any
//! runtime (or the in-memory host used by tests and the RPC server).

mod memory;

pub use memory::{
    DocumentFixture, LibraryFixture, MemoryHost, NodeFixture, NodeFixtureKind,
};

use crate::error::HostResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable identifier of a document node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Classification of a node, determined once when the host describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Component,
    ComponentSet {
        /// The set's designated default variant, if the host exposes one.
        default_variant: Option<NodeId>,
    },
    Other,
}

/// Snapshot of one node as exposed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Children in host order.
    pub children: Vec<NodeId>,
    pub description: Option<String>,
}

impl NodeInfo {
    /// For a component set: the designated default, else the first child.
    pub fn default_variant(&self) -> Option<&NodeId> {
        match &self.kind {
            NodeKind::ComponentSet { default_variant } => {
                default_variant.as_ref().or_else(|| self.children.first())
            }
            NodeKind::Component | NodeKind::Other => None,
        }
    }
}

/// Handle to a freshly created instance node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    pub node_id: NodeId,
    /// Component node the instance was created from.
    pub component_id: NodeId,
}

/// A team library as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDescriptor {
    pub key: String,
    pub name: String,
}

/// One raw entry of a library's published component catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryComponentEntry {
    pub key: String,
    pub name: String,
    /// Identifier of the containing component set, absent for standalone components.
    #[serde(default)]
    pub containing_set: Option<String>,
    #[serde(default)]
    pub is_default_variant: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Document tree, instancing and viewport capabilities.
///
/// Node inspection is synchronous: once a page is loaded its subtree is
/// available without further suspension. Page loading, node lookup by id and
/// instancing may suspend.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Load every document page so their subtrees can be inspected.
    async fn load_all_pages(&self) -> HostResult<()>;

    /// Load a single page.
    async fn load_page(&self, page: &NodeId) -> HostResult<()>;

    /// Document pages in document order.
    fn pages(&self) -> Vec<NodeId>;

    /// The page new instances are appended to.
    fn current_page(&self) -> NodeId;

    /// Describe a loaded node.
    fn inspect(&self, id: &NodeId) -> HostResult<NodeInfo>;

    /// Resolve a node anywhere in the document, loading it if needed.
    async fn node_by_id(&self, id: &NodeId) -> HostResult<Option<NodeInfo>>;

    /// Create an instance of a component node.
    async fn create_instance(&self, component: &NodeId) -> HostResult<InstanceRef>;

    /// Append a node as the last child of a page.
    fn append_to_page(&self, page: &NodeId, instance: &InstanceRef) -> HostResult<()>;

    /// Replace a page's selection.
    fn set_selection(&self, page: &NodeId, nodes: &[InstanceRef]) -> HostResult<()>;

    /// Scroll and zoom the viewport so the nodes are visible.
    fn scroll_and_zoom_into_view(&self, nodes: &[InstanceRef]) -> HostResult<()>;
}

/// Team library capabilities.
#[async_trait]
pub trait LibraryHost: Send + Sync {
    /// Libraries visible to the current user.
    async fn available_libraries(&self) -> HostResult<Vec<LibraryDescriptor>>;

    /// The published component catalog of one library, in listing order.
    async fn library_components(&self, library_id: &str) -> HostResult<Vec<LibraryComponentEntry>>;

    /// Import a library component into the document.
    ///
    /// Returns the local component node, or `None` if nothing was imported.
    async fn import_component(&self, key: &str, library_id: &str) -> HostResult<Option<NodeId>>;
}

pub type DynDocumentHost = Arc<dyn DocumentHost>;
pub type DynLibraryHost = Arc<dyn LibraryHost>;

#[cfg(test)]
mod tests {
    use super::*;

    fn set(default_variant: Option<&str>, children: &[&str]) -> NodeInfo {
        NodeInfo {
            id: NodeId::new("set"),
            name: "Card".into(),
            kind: NodeKind::ComponentSet {
                default_variant: default_variant.map(NodeId::from),
            },
            parent: None,
            children: children.iter().map(|c| NodeId::from(*c)).collect(),
            description: None,
        }
    }

    #[test]
    fn test_default_variant_prefers_designated() {
        let info = set(Some("b"), &["a", "b"]);
        assert_eq!(info.default_variant(), Some(&NodeId::new("b")));
    }

    #[test]
    fn test_default_variant_falls_back_to_first_child() {
        let info = set(None, &["a", "b"]);
        assert_eq!(info.default_variant(), Some(&NodeId::new("a")));
        assert_eq!(set(None, &[]).default_variant(), None);
    }

    #[test]
    fn test_library_entry_defaults() {
        let entry: LibraryComponentEntry =
            serde_json::from_str(r#"{"key": "k1", "name": "Button"}"#).unwrap();
        assert!(entry.containing_set.is_none());
        assert!(!entry.is_default_variant);
    }
}

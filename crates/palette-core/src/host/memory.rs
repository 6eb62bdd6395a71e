//! In-memory document and team-library host.
//!
//! Built from a [`DocumentFixture`] (usually JSON), it behaves like a design
//! tool's runtime: pages load lazily, instances are appended to the current
//! page, selection and viewport focus are recorded. Failures can be injected
//! per operation for exercising the degraded paths.

use super::{
    DocumentHost, InstanceRef, LibraryComponentEntry, LibraryDescriptor, LibraryHost, NodeId,
    NodeInfo, NodeKind,
};
use crate::error::{HostError, HostResult, PaletteError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Node type as written in a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeFixtureKind {
    Page,
    Frame,
    Group,
    Component,
    ComponentSet,
    Instance,
    #[default]
    #[serde(other)]
    Other,
}

/// A node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFixture {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: NodeFixtureKind,
    #[serde(default)]
    pub default_variant: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeFixture>,
}

impl NodeFixture {
    pub fn new(id: &str, name: &str, kind: NodeFixtureKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            default_variant: None,
            description: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<NodeFixture>) -> Self {
        self.children = children;
        self
    }

    pub fn with_default_variant(mut self, id: &str) -> Self {
        self.default_variant = Some(id.to_string());
        self
    }
}

/// A team library and its published catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryFixture {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub components: Vec<LibraryComponentEntry>,
}

/// Whole-document fixture.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFixture {
    pub pages: Vec<NodeFixture>,
    /// Page that receives new instances; defaults to the first page.
    #[serde(default)]
    pub current_page: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryFixture>,
}

impl DocumentFixture {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PaletteError::io_with_path(e, path))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    description: Option<String>,
    /// Page the node lives on; `None` for pages themselves and imported components.
    page: Option<NodeId>,
}

#[derive(Debug, Default)]
struct Failures {
    discovery: Option<String>,
    load_all_pages: Option<String>,
    libraries: HashMap<String, String>,
    nodes: HashMap<NodeId, String>,
    imports: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct DocumentState {
    nodes: HashMap<NodeId, StoredNode>,
    pages: Vec<NodeId>,
    current_page: Option<NodeId>,
    loaded_pages: HashSet<NodeId>,
    libraries: Vec<LibraryFixture>,
    selection: HashMap<NodeId, Vec<NodeId>>,
    viewport: Vec<NodeId>,
    next_instance: u64,
    load_all_calls: usize,
    failures: Failures,
}

impl DocumentState {
    fn insert_subtree(&mut self, fixture: &NodeFixture, parent: Option<&NodeId>, page: Option<&NodeId>) {
        let id = NodeId::new(&fixture.id);
        let kind = match fixture.kind {
            NodeFixtureKind::Component => NodeKind::Component,
            NodeFixtureKind::ComponentSet => NodeKind::ComponentSet {
                default_variant: fixture.default_variant.as_deref().map(NodeId::from),
            },
            NodeFixtureKind::Page
            | NodeFixtureKind::Frame
            | NodeFixtureKind::Group
            | NodeFixtureKind::Instance
            | NodeFixtureKind::Other => NodeKind::Other,
        };

        // Descendants of a page belong to it; a page belongs to itself for loading purposes.
        let child_page = page.cloned().or_else(|| Some(id.clone()));
        for child in &fixture.children {
            self.insert_subtree(child, Some(&id), child_page.as_ref());
        }

        self.nodes.insert(
            id,
            StoredNode {
                name: fixture.name.clone(),
                kind,
                parent: parent.cloned(),
                children: fixture.children.iter().map(|c| NodeId::new(&c.id)).collect(),
                description: fixture.description.clone(),
                page: page.cloned(),
            },
        );
    }

    fn describe(&self, id: &NodeId) -> Option<NodeInfo> {
        self.nodes.get(id).map(|node| NodeInfo {
            id: id.clone(),
            name: node.name.clone(),
            kind: node.kind.clone(),
            parent: node.parent.clone(),
            children: node.children.clone(),
            description: node.description.clone(),
        })
    }

    fn current_page(&self) -> NodeId {
        self.current_page
            .clone()
            .or_else(|| self.pages.first().cloned())
            .unwrap_or_else(|| NodeId::new("0:0"))
    }
}

/// Host backed entirely by memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<DocumentState>,
    load_delay: Option<Duration>,
}

impl MemoryHost {
    pub fn new(fixture: DocumentFixture) -> Self {
        let mut state = DocumentState::default();
        for page in &fixture.pages {
            state.insert_subtree(page, None, None);
            state.pages.push(NodeId::new(&page.id));
        }
        state.current_page = fixture.current_page.as_deref().map(NodeId::from);
        state.libraries = fixture.libraries;

        Self {
            state: Mutex::new(state),
            load_delay: None,
        }
    }

    /// Make page loading suspend for `delay` before completing.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DocumentState> {
        self.state.lock().expect("document state lock poisoned")
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
    }

    // ------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------

    pub fn fail_discovery(&self, message: &str) {
        self.lock().failures.discovery = Some(message.to_string());
    }

    pub fn fail_load_all_pages(&self, message: &str) {
        self.lock().failures.load_all_pages = Some(message.to_string());
    }

    pub fn fail_library(&self, library_id: &str, message: &str) {
        self.lock()
            .failures
            .libraries
            .insert(library_id.to_string(), message.to_string());
    }

    pub fn restore_library(&self, library_id: &str) {
        self.lock().failures.libraries.remove(library_id);
    }

    pub fn fail_node(&self, id: &str, message: &str) {
        self.lock()
            .failures
            .nodes
            .insert(NodeId::new(id), message.to_string());
    }

    pub fn fail_import(&self, key: &str, message: &str) {
        self.lock()
            .failures
            .imports
            .insert(key.to_string(), message.to_string());
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn selection(&self, page: &NodeId) -> Vec<NodeId> {
        self.lock().selection.get(page).cloned().unwrap_or_default()
    }

    pub fn viewport_focus(&self) -> Vec<NodeId> {
        self.lock().viewport.clone()
    }

    pub fn children_of(&self, id: &NodeId) -> Vec<NodeId> {
        self.lock()
            .nodes
            .get(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn is_page_loaded(&self, page: &NodeId) -> bool {
        self.lock().loaded_pages.contains(page)
    }

    /// Number of `load_all_pages` calls so far.
    pub fn load_all_calls(&self) -> usize {
        self.lock().load_all_calls
    }
}

#[async_trait]
impl DocumentHost for MemoryHost {
    async fn load_all_pages(&self) -> HostResult<()> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.load_all_calls += 1;
        if let Some(message) = &state.failures.load_all_pages {
            return Err(HostError::new(message.clone()));
        }
        let pages = state.pages.clone();
        state.loaded_pages.extend(pages);
        Ok(())
    }

    async fn load_page(&self, page: &NodeId) -> HostResult<()> {
        self.simulate_latency().await;
        let mut state = self.lock();
        if !state.pages.contains(page) {
            return Err(HostError::new(format!("{} is not a page", page)));
        }
        state.loaded_pages.insert(page.clone());
        Ok(())
    }

    fn pages(&self) -> Vec<NodeId> {
        self.lock().pages.clone()
    }

    fn current_page(&self) -> NodeId {
        self.lock().current_page()
    }

    fn inspect(&self, id: &NodeId) -> HostResult<NodeInfo> {
        let state = self.lock();
        if let Some(message) = state.failures.nodes.get(id) {
            return Err(HostError::new(message.clone()));
        }
        let node = state
            .nodes
            .get(id)
            .ok_or_else(|| HostError::new(format!("node {} does not exist", id)))?;
        let owning_page = node.page.clone().or_else(|| {
            state.pages.contains(id).then(|| id.clone())
        });
        if let Some(page) = owning_page {
            if !state.loaded_pages.contains(&page) {
                return Err(HostError::new(format!("page {} is not loaded", page)));
            }
        }
        state
            .describe(id)
            .ok_or_else(|| HostError::new(format!("node {} does not exist", id)))
    }

    async fn node_by_id(&self, id: &NodeId) -> HostResult<Option<NodeInfo>> {
        self.simulate_latency().await;
        let mut state = self.lock();
        let page = state.nodes.get(id).and_then(|node| node.page.clone());
        if let Some(page) = page {
            state.loaded_pages.insert(page);
        }
        Ok(state.describe(id))
    }

    async fn create_instance(&self, component: &NodeId) -> HostResult<InstanceRef> {
        let mut state = self.lock();
        let source = state
            .nodes
            .get(component)
            .ok_or_else(|| HostError::new(format!("node {} does not exist", component)))?;
        if source.kind != NodeKind::Component {
            return Err(HostError::new(format!(
                "cannot instantiate non-component node {}",
                component
            )));
        }

        let name = source.name.clone();
        state.next_instance += 1;
        let node_id = NodeId::new(format!("I{}:{}", state.next_instance, component));
        state.nodes.insert(
            node_id.clone(),
            StoredNode {
                name,
                kind: NodeKind::Other,
                parent: None,
                children: Vec::new(),
                description: None,
                page: None,
            },
        );
        debug!("Created instance {} of {}", node_id, component);

        Ok(InstanceRef {
            node_id,
            component_id: component.clone(),
        })
    }

    fn append_to_page(&self, page: &NodeId, instance: &InstanceRef) -> HostResult<()> {
        let mut state = self.lock();
        if !state.pages.contains(page) {
            return Err(HostError::new(format!("{} is not a page", page)));
        }
        if let Some(node) = state.nodes.get_mut(&instance.node_id) {
            node.parent = Some(page.clone());
            node.page = Some(page.clone());
        }
        if let Some(page_node) = state.nodes.get_mut(page) {
            page_node.children.push(instance.node_id.clone());
        }
        Ok(())
    }

    fn set_selection(&self, page: &NodeId, nodes: &[InstanceRef]) -> HostResult<()> {
        let ids = nodes.iter().map(|n| n.node_id.clone()).collect();
        self.lock().selection.insert(page.clone(), ids);
        Ok(())
    }

    fn scroll_and_zoom_into_view(&self, nodes: &[InstanceRef]) -> HostResult<()> {
        self.lock().viewport = nodes.iter().map(|n| n.node_id.clone()).collect();
        Ok(())
    }
}

#[async_trait]
impl LibraryHost for MemoryHost {
    async fn available_libraries(&self) -> HostResult<Vec<LibraryDescriptor>> {
        self.simulate_latency().await;
        let state = self.lock();
        if let Some(message) = &state.failures.discovery {
            return Err(HostError::new(message.clone()));
        }
        Ok(state
            .libraries
            .iter()
            .map(|lib| LibraryDescriptor {
                key: lib.key.clone(),
                name: lib.name.clone(),
            })
            .collect())
    }

    async fn library_components(&self, library_id: &str) -> HostResult<Vec<LibraryComponentEntry>> {
        self.simulate_latency().await;
        let state = self.lock();
        if let Some(message) = state.failures.libraries.get(library_id) {
            return Err(HostError::new(message.clone()));
        }
        state
            .libraries
            .iter()
            .find(|lib| lib.key == library_id)
            .map(|lib| lib.components.clone())
            .ok_or_else(|| HostError::new(format!("library {} is not available", library_id)))
    }

    async fn import_component(&self, key: &str, library_id: &str) -> HostResult<Option<NodeId>> {
        self.simulate_latency().await;
        let mut state = self.lock();
        if let Some(message) = state.failures.imports.get(key) {
            return Err(HostError::new(message.clone()));
        }

        let entry = state
            .libraries
            .iter()
            .find(|lib| lib.key == library_id)
            .and_then(|lib| lib.components.iter().find(|c| c.key == key))
            .cloned();
        let Some(entry) = entry else {
            return Ok(None);
        };

        let node_id = NodeId::new(format!("imported:{}", entry.key));
        state.nodes.entry(node_id.clone()).or_insert(StoredNode {
            name: entry.name,
            kind: NodeKind::Component,
            parent: None,
            children: Vec::new(),
            description: entry.description,
            page: None,
        });
        Ok(Some(node_id))
    }
}

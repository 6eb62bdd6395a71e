//! Instancing a chosen component into the document.
//!
//! Both the local and the library path end the same way: the new instance is
//! appended to the current page, becomes the only selected node, and the
//! viewport is focused on it. Every call creates a new instance.

use crate::error::{PaletteError, Result};
use crate::host::{DynDocumentHost, DynLibraryHost, InstanceRef, NodeId, NodeKind};
use tracing::{debug, info};

pub struct InsertionService {
    document: DynDocumentHost,
    libraries: DynLibraryHost,
}

impl InsertionService {
    pub fn new(document: DynDocumentHost, libraries: DynLibraryHost) -> Self {
        Self {
            document,
            libraries,
        }
    }

    /// Insert an instance of a local component (no `library_id`) or of a
    /// team library component.
    pub async fn insert(&self, component_id: &str, library_id: Option<&str>) -> Result<InstanceRef> {
        let component = match library_id {
            Some(library_id) => self.resolve_library(component_id, library_id).await?,
            None => self.resolve_local(component_id).await?,
        };

        let instance = self.document.create_instance(&component).await?;
        let page = self.document.current_page();
        self.document.append_to_page(&page, &instance)?;
        self.document
            .set_selection(&page, std::slice::from_ref(&instance))?;
        self.document
            .scroll_and_zoom_into_view(std::slice::from_ref(&instance))?;

        info!(
            "Inserted instance {} of {} on page {}",
            instance.node_id, component, page
        );
        Ok(instance)
    }

    async fn resolve_library(&self, key: &str, library_id: &str) -> Result<NodeId> {
        let imported = self
            .libraries
            .import_component(key, library_id)
            .await
            .map_err(|e| PaletteError::Import {
                component_id: key.to_string(),
                library_id: library_id.to_string(),
                message: e.message,
            })?;

        imported.ok_or_else(|| PaletteError::NotFound {
            component_id: key.to_string(),
        })
    }

    async fn resolve_local(&self, component_id: &str) -> Result<NodeId> {
        let node = self
            .document
            .node_by_id(&NodeId::new(component_id))
            .await?
            .ok_or_else(|| PaletteError::NotFound {
                component_id: component_id.to_string(),
            })?;

        match node.kind {
            NodeKind::Component => Ok(node.id),
            NodeKind::ComponentSet { .. } => {
                let variant = node.default_variant().cloned().ok_or_else(|| {
                    PaletteError::InvalidTarget {
                        node_id: component_id.to_string(),
                        reason: "component set has no variants".to_string(),
                    }
                })?;
                debug!("Resolved component set {} to variant {}", node.id, variant);
                Ok(variant)
            }
            NodeKind::Other => Err(PaletteError::InvalidTarget {
                node_id: component_id.to_string(),
                reason: format!("{} is not a component or component set", node.name),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        DocumentFixture, DocumentHost, LibraryComponentEntry, LibraryFixture, MemoryHost,
        NodeFixture, NodeFixtureKind,
    };
    use std::sync::Arc;

    fn host() -> Arc<MemoryHost> {
        Arc::new(MemoryHost::new(DocumentFixture {
            pages: vec![
                NodeFixture::new("0:1", "Page 1", NodeFixtureKind::Page).with_children(vec![
                    NodeFixture::new("1:1", "Button", NodeFixtureKind::Component),
                    NodeFixture::new("2:1", "Card", NodeFixtureKind::ComponentSet)
                        .with_default_variant("2:3")
                        .with_children(vec![
                            NodeFixture::new("2:2", "Card/Default", NodeFixtureKind::Component),
                            NodeFixture::new("2:3", "Card/Hover", NodeFixtureKind::Component),
                        ]),
                    NodeFixture::new("3:1", "Frame", NodeFixtureKind::Frame),
                    NodeFixture::new("4:1", "Empty", NodeFixtureKind::ComponentSet),
                ]),
                NodeFixture::new("0:2", "Page 2", NodeFixtureKind::Page),
            ],
            current_page: Some("0:2".into()),
            libraries: vec![LibraryFixture {
                key: "lib-a".into(),
                name: "Core".into(),
                components: vec![LibraryComponentEntry {
                    key: "k-avatar".into(),
                    name: "Avatar".into(),
                    containing_set: None,
                    is_default_variant: false,
                    description: None,
                    thumbnail_url: None,
                }],
            }],
        }))
    }

    fn service(host: &Arc<MemoryHost>) -> InsertionService {
        InsertionService::new(host.clone(), host.clone())
    }

    #[tokio::test]
    async fn test_local_component_is_appended_selected_and_focused() {
        let host = host();
        let instance = service(&host).insert("1:1", None).await.unwrap();

        let page = NodeId::new("0:2");
        assert_eq!(instance.component_id, NodeId::new("1:1"));
        assert_eq!(host.children_of(&page), vec![instance.node_id.clone()]);
        assert_eq!(host.selection(&page), vec![instance.node_id.clone()]);
        assert_eq!(host.viewport_focus(), vec![instance.node_id]);
    }

    #[tokio::test]
    async fn test_component_set_instantiates_default_variant() {
        let host = host();
        let instance = service(&host).insert("2:1", None).await.unwrap();
        assert_eq!(instance.component_id, NodeId::new("2:3"));
    }

    #[tokio::test]
    async fn test_unknown_local_id_is_not_found() {
        let host = host();
        let err = service(&host).insert("9:9", None).await.unwrap_err();
        assert!(matches!(err, PaletteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_non_component_is_invalid_target() {
        let host = host();
        let err = service(&host).insert("3:1", None).await.unwrap_err();
        assert!(matches!(err, PaletteError::InvalidTarget { .. }));

        let err = service(&host).insert("4:1", None).await.unwrap_err();
        assert!(matches!(err, PaletteError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn test_library_component_is_imported_then_inserted() {
        let host = host();
        let instance = service(&host).insert("k-avatar", Some("lib-a")).await.unwrap();
        assert_eq!(instance.component_id, NodeId::new("imported:k-avatar"));
        assert_eq!(host.selection(&host.current_page()), vec![instance.node_id]);
    }

    #[tokio::test]
    async fn test_library_import_yielding_nothing_is_not_found() {
        let host = host();
        let err = service(&host)
            .insert("k-missing", Some("lib-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaletteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_library_import_failure_is_import_error() {
        let host = host();
        host.fail_import("k-avatar", "library unpublished");
        let err = service(&host)
            .insert("k-avatar", Some("lib-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaletteError::Import { .. }));
    }

    #[tokio::test]
    async fn test_repeated_inserts_create_new_instances() {
        let host = host();
        let service = service(&host);
        let first = service.insert("1:1", None).await.unwrap();
        let second = service.insert("1:1", None).await.unwrap();

        assert_ne!(first.node_id, second.node_id);
        assert_eq!(host.children_of(&NodeId::new("0:2")).len(), 2);
        assert_eq!(host.selection(&NodeId::new("0:2")), vec![second.node_id]);
    }
}

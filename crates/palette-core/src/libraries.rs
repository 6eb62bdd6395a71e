//! Team library discovery and catalog sync.
//!
//! Library catalogs arrive as flat lists of published components in which
//! variants point at their containing set. They are normalized into the same
//! [`ComponentRecord`] shape as local components, with the same default-variant
//! reduction the tree walker applies. Every library keeps its own
//! [`LibrarySyncResult`]; one library failing never touches another.

use crate::config::AppConfig;
use crate::error::{PaletteError, Result};
use crate::host::{DynLibraryHost, LibraryComponentEntry};
use crate::types::{ComponentRecord, Library, LibraryStatus, LibrarySyncResult, RecordKind};
use crate::walker::VariantPolicy;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Normalize a raw catalog into records.
///
/// Standalone entries come first in listing order, followed by set-derived
/// entries grouped by set in order of first appearance.
pub fn normalize_catalog(
    entries: &[LibraryComponentEntry],
    library_id: &str,
    library_name: &str,
    policy: VariantPolicy,
) -> Vec<ComponentRecord> {
    let mut standalone = Vec::new();
    let mut sets: Vec<(&str, Vec<&LibraryComponentEntry>)> = Vec::new();

    for entry in entries {
        match entry.containing_set.as_deref() {
            Some(set_id) => match sets.iter_mut().find(|(id, _)| *id == set_id) {
                Some((_, variants)) => variants.push(entry),
                None => sets.push((set_id, vec![entry])),
            },
            None => standalone.push(entry),
        }
    }

    let to_record = |entry: &LibraryComponentEntry| ComponentRecord {
        id: entry.key.clone(),
        name: entry.name.clone(),
        kind: RecordKind::LibraryComponent,
        library_id: Some(library_id.to_string()),
        library_name: Some(library_name.to_string()),
        is_default_variant: None,
        component_set_id: None,
        description: entry.description.clone(),
        thumbnail_url: entry.thumbnail_url.clone(),
    };

    let mut records: Vec<ComponentRecord> = standalone.into_iter().map(to_record).collect();

    for (set_id, variants) in sets {
        if policy.only_default_variants {
            let chosen = variants
                .iter()
                .find(|v| v.is_default_variant)
                .or_else(|| variants.first());
            if let Some(variant) = chosen {
                records.push(to_record(*variant).with_variant_of(set_id, true));
            }
        } else {
            records.extend(
                variants
                    .into_iter()
                    .map(|v| to_record(v).with_variant_of(set_id, v.is_default_variant)),
            );
        }
    }

    records
}

/// Discovered libraries and their per-library sync results.
pub struct LibraryRegistry {
    host: DynLibraryHost,
    policy: VariantPolicy,
    libraries: RwLock<Vec<Library>>,
    synced: RwLock<BTreeMap<String, LibrarySyncResult>>,
}

impl LibraryRegistry {
    pub fn new(host: DynLibraryHost, policy: VariantPolicy) -> Self {
        Self {
            host,
            policy,
            libraries: RwLock::new(Vec::new()),
            synced: RwLock::new(BTreeMap::new()),
        }
    }

    /// Query the host for every library visible to the session.
    ///
    /// On failure the known library set becomes empty and a
    /// [`PaletteError::Discovery`] is returned for the caller to report.
    pub async fn discover(&self) -> Result<Vec<Library>> {
        match self.host.available_libraries().await {
            Ok(descriptors) => {
                let libraries: Vec<Library> = descriptors
                    .into_iter()
                    .map(|lib| Library {
                        id: lib.key,
                        name: lib.name,
                        status: LibraryStatus::Active,
                    })
                    .collect();
                info!("Discovered {} team libraries", libraries.len());
                *self.libraries.write().await = libraries.clone();
                Ok(libraries)
            }
            Err(e) => {
                warn!("Team library discovery failed: {}", e);
                self.libraries.write().await.clear();
                Err(PaletteError::Discovery { message: e.message })
            }
        }
    }

    /// Fetch and normalize one library's catalog, replacing its sync result.
    ///
    /// On failure the library's previous result is dropped so it contributes
    /// no records until a later sync succeeds.
    pub async fn sync(&self, library_id: &str) -> Result<Vec<ComponentRecord>> {
        let entries = match self.host.library_components(library_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Sync of team library {} failed: {}", library_id, e);
                self.synced.write().await.remove(library_id);
                return Err(PaletteError::Sync {
                    library_id: library_id.to_string(),
                    message: e.message,
                });
            }
        };

        let library_name = self
            .libraries
            .read()
            .await
            .iter()
            .find(|lib| lib.id == library_id)
            .map(|lib| lib.name.clone())
            .unwrap_or_else(|| AppConfig::UNKNOWN_LIBRARY_NAME.to_string());

        let records = normalize_catalog(&entries, library_id, &library_name, self.policy);
        debug!(
            "Synced team library {} ({}): {} entries -> {} records",
            library_id,
            library_name,
            entries.len(),
            records.len()
        );

        self.synced.write().await.insert(
            library_id.to_string(),
            LibrarySyncResult::new(records.clone()),
        );
        Ok(records)
    }

    pub async fn libraries(&self) -> Vec<Library> {
        self.libraries.read().await.clone()
    }

    pub async fn sync_result(&self, library_id: &str) -> Option<LibrarySyncResult> {
        self.synced.read().await.get(library_id).cloned()
    }

    /// Records of every synced library: discovered libraries in discovery
    /// order, then libraries synced outside discovery ordered by id.
    pub async fn merged_records(&self) -> Vec<ComponentRecord> {
        let libraries = self.libraries.read().await;
        let synced = self.synced.read().await;

        let discovered = libraries.iter().filter_map(|lib| synced.get(&lib.id));
        let extra = synced
            .iter()
            .filter(|(id, _)| !libraries.iter().any(|lib| &lib.id == *id))
            .map(|(_, result)| result);

        discovered
            .chain(extra)
            .flat_map(|result| result.components.iter().cloned())
            .collect()
    }
}

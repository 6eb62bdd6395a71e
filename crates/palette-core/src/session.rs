//! Discovery session: the load sequence and the UI request loop.
//!
//! A [`Session`] owns everything one plugin run needs: the library registry,
//! the pagination store and the insertion service. A full load walks
//!
//! ```text
//! Idle -> DiscoveringLibraries -> SyncingLibraries(0..n) -> ScanningLocal -> Merging -> Ready
//! ```
//!
//! reporting advisory progress along the way. Sub-steps degrade to empty
//! results; only host-level failures land in `Error`, which a refresh leaves.

use crate::config::{PaletteConfig, ProgressConfig};
use crate::error::Result;
use crate::events::{EventSink, PluginEvent, UiMessage};
use crate::host::{DynDocumentHost, DynLibraryHost, InstanceRef, NodeId};
use crate::insert::InsertionService;
use crate::libraries::LibraryRegistry;
use crate::pagination::PaginationStore;
use crate::types::{ComponentRecord, Library, Page};
use crate::walker::{ScanReport, TreeWalker, VariantPolicy};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Where the session is in its load sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    DiscoveringLibraries,
    SyncingLibraries { done: usize, total: usize },
    ScanningLocal,
    Merging,
    Ready,
    Error { message: String },
    /// The UI cancelled the session.
    Closed,
}

/// What the transport should do after a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Terminate,
}

/// Emits `loading-status` events whose progress never moves backwards.
struct ProgressReporter {
    events: Arc<dyn EventSink>,
    last: Mutex<f64>,
}

impl ProgressReporter {
    fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            events,
            last: Mutex::new(0.0),
        }
    }

    fn restart(&self) {
        *self.last.lock().expect("progress lock poisoned") = 0.0;
    }

    fn report(&self, message: impl Into<String>, progress: f64) {
        let progress = {
            let mut last = self.last.lock().expect("progress lock poisoned");
            *last = progress.clamp(*last, ProgressConfig::DONE);
            *last
        };
        let message = message.into();
        debug!("Progress {:.2}: {}", progress, message);
        self.events.emit(PluginEvent::LoadingStatus { message, progress });
    }
}

pub struct Session {
    config: PaletteConfig,
    document: DynDocumentHost,
    registry: LibraryRegistry,
    insertion: InsertionService,
    pagination: PaginationStore,
    events: Arc<dyn EventSink>,
    progress: ProgressReporter,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(
        config: PaletteConfig,
        document: DynDocumentHost,
        libraries: DynLibraryHost,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = VariantPolicy::from(&config);

        Ok(Self {
            registry: LibraryRegistry::new(libraries.clone(), policy),
            insertion: InsertionService::new(document.clone(), libraries),
            pagination: PaginationStore::new(config.page_size),
            progress: ProgressReporter::new(events.clone()),
            state: RwLock::new(SessionState::Idle),
            config,
            document,
            events,
        })
    }

    pub fn config(&self) -> &PaletteConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn libraries(&self) -> Vec<Library> {
        self.registry.libraries().await
    }

    /// Whether a page request is currently being served.
    pub fn is_loading(&self) -> bool {
        self.pagination.is_loading()
    }

    pub fn registry(&self) -> &LibraryRegistry {
        &self.registry
    }

    async fn set_state(&self, state: SessionState) {
        debug!("Session state -> {:?}", state);
        *self.state.write().await = state;
    }

    // ------------------------------------------------------------------
    // Message loop
    // ------------------------------------------------------------------

    /// Handle one UI request, emitting its response events.
    pub async fn handle(&self, message: UiMessage) -> Disposition {
        debug!("Handling {}", message.kind());
        match message {
            UiMessage::InsertComponent {
                component_id,
                library_id,
            } => {
                let _ = self
                    .insert_component(&component_id, library_id.as_deref())
                    .await;
            }
            UiMessage::LoadMoreComponents => {
                self.load_next_page().await;
            }
            UiMessage::RefreshComponents => {
                self.initialize().await;
            }
            UiMessage::SyncLibrary { library_id } => {
                let _ = self.sync_library(&library_id).await;
            }
            UiMessage::Cancel => {
                self.close().await;
                return Disposition::Terminate;
            }
        }
        Disposition::Continue
    }

    // ------------------------------------------------------------------
    // Load sequence
    // ------------------------------------------------------------------

    /// Run a full load from `Idle` and emit the first page.
    ///
    /// A refresh arriving while an earlier load is still running supersedes
    /// it: the earlier load stops touching state and progress, and its
    /// result is discarded. Returns `false` when the sequence ended in
    /// `Error`.
    pub async fn initialize(&self) -> bool {
        self.set_state(SessionState::Idle).await;
        self.progress.restart();
        self.progress
            .report("Loading components...", ProgressConfig::START);
        let generation = self.pagination.reset().await;

        match self.run_load(generation).await {
            Ok(()) => true,
            Err(_) if !self.is_current(generation) => {
                debug!("Superseded load failed, ignoring");
                true
            }
            Err(e) => {
                error!("Failed to initialize component data: {}", e);
                self.set_state(SessionState::Error {
                    message: e.to_string(),
                })
                .await;
                self.events.emit(PluginEvent::InitializationError {
                    error: e.to_string(),
                });
                false
            }
        }
    }

    async fn run_load(&self, generation: u64) -> Result<()> {
        if self.config.enable_team_libraries {
            self.load_team_libraries(generation).await;
        }

        self.set_state_in(generation, SessionState::ScanningLocal)
            .await;
        self.report_in(
            generation,
            "Loading local components...",
            ProgressConfig::SCANNING_LOCAL,
        );

        let page = self
            .pagination
            .next_page_in(generation, || self.assemble(generation))
            .await?;
        match page {
            Some(page) => {
                self.emit_page(&page);
                self.set_state_in(generation, SessionState::Ready).await;
            }
            None if !self.is_current(generation) => {
                info!("Load superseded by a refresh, leaving the first page to it");
            }
            None => {
                // A load-more of this generation claimed the first page and
                // moves the session to Ready itself.
                debug!("First page served by a concurrent page request");
            }
        }
        Ok(())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.pagination.generation() == generation
    }

    /// `set_state` on behalf of a load, skipped once a refresh superseded it.
    async fn set_state_in(&self, generation: u64, state: SessionState) {
        if self.is_current(generation) {
            self.set_state(state).await;
        }
    }

    fn report_in(&self, generation: u64, message: impl Into<String>, progress: f64) {
        if self.is_current(generation) {
            self.progress.report(message, progress);
        }
    }

    async fn load_team_libraries(&self, generation: u64) {
        self.set_state_in(generation, SessionState::DiscoveringLibraries)
            .await;
        self.report_in(
            generation,
            "Discovering available team libraries...",
            ProgressConfig::DISCOVERING,
        );

        let libraries = match self.registry.discover().await {
            Ok(libraries) => {
                self.events.emit(PluginEvent::TeamLibrariesLoaded {
                    libraries: libraries.clone(),
                });
                libraries
            }
            Err(e) => {
                self.events
                    .emit(PluginEvent::TeamLibrariesError { error: e.to_string() });
                Vec::new()
            }
        };

        if libraries.is_empty() {
            self.report_in(
                generation,
                "No team libraries found",
                ProgressConfig::NO_LIBRARIES,
            );
            return;
        }

        let total = libraries.len();
        self.report_in(
            generation,
            format!("Found {} team libraries, loading components...", total),
            ProgressConfig::LIBRARIES_FOUND,
        );
        for (done, library) in libraries.iter().enumerate() {
            self.set_state_in(generation, SessionState::SyncingLibraries { done, total })
                .await;
            self.report_in(
                generation,
                format!(
                    "Loading team library \"{}\" ({}/{})...",
                    library.name,
                    done + 1,
                    total
                ),
                ProgressConfig::LIBRARIES_FOUND
                    + (done as f64 / total as f64) * ProgressConfig::SYNC_SPAN,
            );
            if let Err(e) = self.registry.sync(&library.id).await {
                self.events.emit(PluginEvent::LibrarySyncError {
                    library_id: library.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Build the backing list: local records first, then team library records.
    async fn assemble(&self, generation: u64) -> Result<Vec<ComponentRecord>> {
        let scan = self.scan_local(generation).await?;
        if !scan.failures.is_empty() {
            warn!(
                "Local scan skipped {} subtrees that failed to load",
                scan.failures.len()
            );
        }

        self.set_state_in(generation, SessionState::Merging).await;
        let mut records = scan.records;
        if self.config.enable_team_libraries {
            let team = self.registry.merged_records().await;
            self.report_in(
                generation,
                format!("Merged {} team library components", team.len()),
                ProgressConfig::MERGED,
            );
            records.extend(team);
        }

        let records = dedup_records(records);
        self.report_in(
            generation,
            format!("Finished loading, {} components in total", records.len()),
            ProgressConfig::DONE,
        );
        info!("Assembled {} component records", records.len());
        Ok(records)
    }

    async fn scan_local(&self, generation: u64) -> Result<ScanReport> {
        let pages = self.pages_to_scan(generation).await?;
        let walker = TreeWalker::new(self.document.as_ref(), VariantPolicy::from(&self.config));

        let total = pages.len();
        let mut report = ScanReport::default();
        for (index, page) in pages.iter().enumerate() {
            report.extend(walker.scan(page));
            let scanned = index + 1;
            self.report_in(
                generation,
                format!(
                    "Found {} components in {}/{} pages...",
                    report.records.len(),
                    scanned,
                    total
                ),
                ProgressConfig::PAGES_LOADED
                    + (scanned as f64 / total as f64) * ProgressConfig::PAGE_SPAN,
            );
        }
        Ok(report)
    }

    /// Load the pages the scan covers, falling back to the current page.
    async fn pages_to_scan(&self, generation: u64) -> Result<Vec<NodeId>> {
        if self.config.load_all_pages {
            match self.document.load_all_pages().await {
                Ok(()) => {
                    let pages: Vec<NodeId> = self
                        .document
                        .pages()
                        .into_iter()
                        .take(self.config.max_pages_to_load)
                        .collect();
                    self.report_in(
                        generation,
                        format!("Loading components from {} pages...", pages.len()),
                        ProgressConfig::PAGES_LOADED,
                    );
                    return Ok(pages);
                }
                Err(e) => {
                    warn!("Loading all pages failed, scanning current page only: {}", e);
                }
            }
        }

        let current = self.document.current_page();
        self.document.load_page(&current).await?;
        Ok(vec![current])
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Serve the next page to the UI.
    ///
    /// Returns `None` when the request was dropped because another one is
    /// pending, or when loading failed (reported as `page-load-error`).
    pub async fn load_next_page(&self) -> Option<Page> {
        let generation = self.pagination.generation();
        match self
            .pagination
            .next_page_in(generation, || self.assemble(generation))
            .await
        {
            Ok(Some(page)) => {
                self.emit_page(&page);
                if self.state().await != SessionState::Ready {
                    self.set_state(SessionState::Ready).await;
                }
                Some(page)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Failed to load component page: {}", e);
                self.events
                    .emit(PluginEvent::PageLoadError { error: e.to_string() });
                None
            }
        }
    }

    fn emit_page(&self, page: &Page) {
        self.events.emit(PluginEvent::ComponentsPageLoaded {
            components: page.records.clone(),
            current_page: page.page_index,
            has_more: page.has_more(),
        });
    }

    /// Insert a component and report the outcome as `component-inserted`.
    pub async fn insert_component(
        &self,
        component_id: &str,
        library_id: Option<&str>,
    ) -> Result<InstanceRef> {
        let result = self.insertion.insert(component_id, library_id).await;
        let error = match &result {
            Ok(_) => None,
            Err(e) => {
                error!("Failed to insert component {}: {}", component_id, e);
                Some(e.to_string())
            }
        };
        self.events.emit(PluginEvent::ComponentInserted {
            success: error.is_none(),
            component_id: component_id.to_string(),
            error,
        });
        result
    }

    /// Re-sync one library and report the outcome as `library-synced`.
    ///
    /// The refreshed records show up in the next full load.
    pub async fn sync_library(&self, library_id: &str) -> Result<Vec<ComponentRecord>> {
        let result = self.registry.sync(library_id).await;
        match &result {
            Ok(records) => {
                info!("Re-synced team library {}: {} records", library_id, records.len());
                self.events.emit(PluginEvent::LibrarySynced {
                    library_id: library_id.to_string(),
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                self.events.emit(PluginEvent::LibrarySyncError {
                    library_id: library_id.to_string(),
                    error: e.to_string(),
                });
                self.events.emit(PluginEvent::LibrarySynced {
                    library_id: library_id.to_string(),
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
        result
    }

    /// End the session at the UI's request.
    pub async fn close(&self) {
        info!("Session closed by the UI");
        self.set_state(SessionState::Closed).await;
    }
}

/// Drop exact `(kind, id, libraryId)` repeats, keeping the first occurrence.
fn dedup_records(records: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(record.identity());
            if !fresh {
                debug!("Dropping duplicate record {} ({})", record.id, record.kind);
            }
            fresh
        })
        .collect()
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! Palette Core - Headless component discovery and insertion engine.
//!
//! This crate finds the reusable components of a design document and of the
//! team libraries linked to it, serves them to a plugin UI in fixed-size
//! pages, and inserts instances of the chosen ones back into the document.
//! It talks to the design tool only through the traits in [`host`], so it can
//! be driven without any HTTP/RPC layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use palette_core::{BufferedSink, DocumentFixture, MemoryHost, PaletteConfig, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> palette_core::Result<()> {
//!     let host = Arc::new(MemoryHost::new(DocumentFixture::default()));
//!     let sink = Arc::new(BufferedSink::new());
//!     let session = Session::new(PaletteConfig::default(), host.clone(), host, sink.clone())?;
//!
//!     session.initialize().await;
//!     for event in sink.drain() {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod insert;
pub mod libraries;
pub mod pagination;
pub mod session;
pub mod types;
pub mod walker;

// Re-export commonly used types
pub use config::{AppConfig, PaletteConfig, ProgressConfig, RpcConfig};
pub use error::{HostError, HostResult, PaletteError, Result};
pub use events::{BufferedSink, EventSink, PluginEvent, UiMessage};
pub use host::{
    DocumentFixture, DocumentHost, DynDocumentHost, DynLibraryHost, InstanceRef,
    LibraryComponentEntry, LibraryDescriptor, LibraryFixture, LibraryHost, MemoryHost,
    NodeFixture, NodeFixtureKind, NodeId, NodeInfo, NodeKind,
};
pub use insert::InsertionService;
pub use libraries::{normalize_catalog, LibraryRegistry};
pub use pagination::PaginationStore;
pub use session::{Disposition, Session, SessionState};
pub use types::{ComponentRecord, Library, LibraryStatus, LibrarySyncResult, Page, RecordKind};
pub use walker::{ScanReport, TreeWalker, VariantPolicy};

//! Component records and library types.
//!
//! These serialize in the camelCase shape the plugin UI consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source and shape of a component record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// A component node in the open document (standalone or a variant).
    LocalComponent,
    /// A component set node in the open document.
    LocalComponentSet,
    /// A component published by a team library.
    LibraryComponent,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::LocalComponent => "LocalComponent",
            RecordKind::LocalComponentSet => "LocalComponentSet",
            RecordKind::LibraryComponent => "LibraryComponent",
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, RecordKind::LibraryComponent)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One browsable component, local or from a team library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    /// Node id for local records, component key for library records.
    pub id: String,
    pub name: String,
    pub kind: RecordKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default_variant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_set_id: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl ComponentRecord {
    /// A record for a node in the open document.
    pub fn local(id: impl Into<String>, name: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            library_id: None,
            library_name: None,
            is_default_variant: None,
            component_set_id: None,
            description: None,
            thumbnail_url: None,
        }
    }

    /// Mark the record as derived from a component set.
    pub fn with_variant_of(mut self, set_id: impl Into<String>, is_default: bool) -> Self {
        self.component_set_id = Some(set_id.into());
        self.is_default_variant = Some(is_default);
        self
    }

    pub fn is_local(&self) -> bool {
        self.kind.is_local()
    }

    /// The `(kind, id, libraryId)` triple that is unique within a load.
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity {
            kind: self.kind,
            id: self.id.clone(),
            library_id: self.library_id.clone(),
        }
    }
}

/// Uniqueness key of a record within one load session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordIdentity {
    pub kind: RecordKind,
    pub id: String,
    pub library_id: Option<String>,
}

/// Availability of a discovered team library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryStatus {
    Active,
}

/// A team library visible to the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub id: String,
    pub name: String,
    pub status: LibraryStatus,
}

/// Normalized catalog of one library as of its last successful sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySyncResult {
    pub components: Vec<ComponentRecord>,
    pub last_synced: DateTime<Utc>,
}

impl LibrarySyncResult {
    pub fn new(components: Vec<ComponentRecord>) -> Self {
        Self {
            components,
            last_synced: Utc::now(),
        }
    }
}

/// One slice served by the pagination store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub records: Vec<ComponentRecord>,
    /// Number of non-empty pages served so far, including this one.
    pub page_index: usize,
    pub exhausted: bool,
}

impl Page {
    pub fn has_more(&self) -> bool {
        !self.exhausted
    }
}

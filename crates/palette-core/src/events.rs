//! Messages exchanged with the plugin UI.
//!
//! Inbound [`UiMessage`]s are requests; outbound [`PluginEvent`]s are either
//! responses to them or fire-and-forget notifications. Both use the
//! kebab-case `type` tag and camelCase payload fields the UI speaks.

use crate::types::{ComponentRecord, Library};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Request sent by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiMessage {
    #[serde(rename_all = "camelCase")]
    InsertComponent {
        component_id: String,
        #[serde(default)]
        library_id: Option<String>,
    },
    LoadMoreComponents,
    RefreshComponents,
    #[serde(rename_all = "camelCase")]
    SyncLibrary { library_id: String },
    Cancel,
}

impl UiMessage {
    /// The wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            UiMessage::InsertComponent { .. } => "insert-component",
            UiMessage::LoadMoreComponents => "load-more-components",
            UiMessage::RefreshComponents => "refresh-components",
            UiMessage::SyncLibrary { .. } => "sync-library",
            UiMessage::Cancel => "cancel",
        }
    }
}

/// Event posted to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PluginEvent {
    LoadingStatus {
        message: String,
        progress: f64,
    },
    TeamLibrariesLoaded {
        libraries: Vec<Library>,
    },
    TeamLibrariesError {
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    ComponentsPageLoaded {
        components: Vec<ComponentRecord>,
        current_page: usize,
        has_more: bool,
    },
    #[serde(rename_all = "camelCase")]
    ComponentInserted {
        success: bool,
        component_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LibrarySynced {
        library_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    InitializationError {
        error: String,
    },
    PageLoadError {
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    LibrarySyncError {
        library_id: String,
        error: String,
    },
}

/// Destination of outbound events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PluginEvent);
}

/// Keeps events until the transport drains them.
#[derive(Debug, Default)]
pub struct BufferedSink {
    events: Mutex<VecDeque<PluginEvent>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every event emitted since the last drain, oldest first.
    pub fn drain(&self) -> Vec<PluginEvent> {
        self.events
            .lock()
            .expect("event buffer lock poisoned")
            .drain(..)
            .collect()
    }
}

impl EventSink for BufferedSink {
    fn emit(&self, event: PluginEvent) {
        self.events
            .lock()
            .expect("event buffer lock poisoned")
            .push_back(event);
    }
}

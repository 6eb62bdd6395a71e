//! Error types for Palette.
//!
//! Every failure the engine can report maps to one variant here. Most of them
//! are recoverable where they originate (a failed library sync contributes no
//! records, a failed subtree is skipped); only host-level failures abort the
//! load sequence.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a host call (document tree, team libraries, viewport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for host calls.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Main error type for the Palette engine.
#[derive(Debug, Error)]
pub enum PaletteError {
    // Discovery and scanning
    #[error("Failed to discover team libraries: {message}")]
    Discovery { message: String },

    #[error("Failed to sync team library {library_id}: {message}")]
    Sync { library_id: String, message: String },

    #[error("Failed to scan node {node_id}: {message}")]
    Scan { node_id: String, message: String },

    // Insertion
    #[error("Component not found: {component_id}")]
    NotFound { component_id: String },

    #[error("Node {node_id} is not a component: {reason}")]
    InvalidTarget { node_id: String, reason: String },

    #[error("Failed to import component {component_id} from library {library_id}: {message}")]
    Import {
        component_id: String,
        library_id: String,
        message: String,
    },

    // Host runtime
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    // Configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Protocol
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Palette operations.
pub type Result<T> = std::result::Result<T, PaletteError>;

impl From<std::io::Error> for PaletteError {
    fn from(err: std::io::Error) -> Self {
        PaletteError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PaletteError {
    fn from(err: serde_json::Error) -> Self {
        PaletteError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl PaletteError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        PaletteError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Host runtime error
    /// - -32002: Component not found
    /// - -32003: Import or sync failed
    /// - -32005: Invalid insertion target
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            PaletteError::Host(_) | PaletteError::Discovery { .. } => -32000,

            PaletteError::NotFound { .. } => -32002,

            PaletteError::Import { .. } | PaletteError::Sync { .. } => -32003,

            PaletteError::InvalidTarget { .. } => -32005,

            PaletteError::InvalidParams { .. } | PaletteError::Json { .. } => -32602,

            _ => -32603,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PaletteError::NotFound {
            component_id: "1:23".into(),
        };
        assert_eq!(err.to_string(), "Component not found: 1:23");

        let err = PaletteError::Host(HostError::new("document closed"));
        assert_eq!(err.to_string(), "Host error: document closed");
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            PaletteError::NotFound {
                component_id: "x".into()
            }
            .to_rpc_error_code(),
            -32002
        );
        assert_eq!(
            PaletteError::InvalidTarget {
                node_id: "x".into(),
                reason: "frame".into()
            }
            .to_rpc_error_code(),
            -32005
        );
        assert_eq!(
            PaletteError::InvalidParams {
                message: "missing componentId".into()
            }
            .to_rpc_error_code(),
            -32602
        );
        assert_eq!(PaletteError::Other("boom".into()).to_rpc_error_code(), -32603);
    }
}

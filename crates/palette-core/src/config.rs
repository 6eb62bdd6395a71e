//! Centralized configuration for Palette.
//!
//! `PaletteConfig` holds the runtime policy knobs (page size, variant
//! reduction, page loading); the unit structs hold fixed constants.

use crate::error::{PaletteError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Palette";
    pub const UNKNOWN_LIBRARY_NAME: &'static str = "Unknown library";
}

/// Fixed progress milestones reported during a full load.
pub struct ProgressConfig;

impl ProgressConfig {
    pub const START: f64 = 0.0;
    pub const DISCOVERING: f64 = 0.1;
    pub const LIBRARIES_FOUND: f64 = 0.2;
    /// Share of the bar spent syncing libraries, starting at `LIBRARIES_FOUND`.
    pub const SYNC_SPAN: f64 = 0.3;
    pub const NO_LIBRARIES: f64 = 0.3;
    pub const SCANNING_LOCAL: f64 = 0.5;
    pub const PAGES_LOADED: f64 = 0.6;
    /// Share of the bar spent walking pages, starting at `PAGES_LOADED`.
    pub const PAGE_SPAN: f64 = 0.2;
    pub const MERGED: f64 = 0.9;
    pub const DONE: f64 = 1.0;
}

/// JSON-RPC transport limits.
pub struct RpcConfig;

impl RpcConfig {
    pub const MAX_BODY_BYTES: usize = 1_048_576; // 1MB
}

/// Runtime policy for a discovery session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaletteConfig {
    /// Number of records per page.
    pub page_size: usize,
    /// Reduce every component set to its default variant.
    pub only_default_variants: bool,
    /// Emit a record for the set node itself when variants are not reduced.
    pub include_set_records: bool,
    /// Load and scan every document page instead of only the current one.
    pub load_all_pages: bool,
    /// Upper bound on document pages scanned when `load_all_pages` is set.
    pub max_pages_to_load: usize,
    /// Discover and sync team libraries before scanning.
    pub enable_team_libraries: bool,
}

impl PaletteConfig {
    pub const DEFAULT_PAGE_SIZE: usize = 50;
    pub const DEFAULT_MAX_PAGES_TO_LOAD: usize = 5;

    /// Load a configuration file, filling unspecified fields with defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PaletteError::io_with_path(e, path))?;
        let config: PaletteConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pagination and page loading cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(PaletteError::Config {
                message: "pageSize must be greater than zero".to_string(),
            });
        }
        if self.load_all_pages && self.max_pages_to_load == 0 {
            return Err(PaletteError::Config {
                message: "maxPagesToLoad must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            page_size: Self::DEFAULT_PAGE_SIZE,
            only_default_variants: true,
            include_set_records: true,
            load_all_pages: true,
            max_pages_to_load: Self::DEFAULT_MAX_PAGES_TO_LOAD,
            enable_team_libraries: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PaletteConfig::default();
        assert_eq!(config.page_size, 50);
        assert!(config.only_default_variants);
        assert!(config.load_all_pages);
        assert_eq!(config.max_pages_to_load, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PaletteConfig =
            serde_json::from_str(r#"{"pageSize": 10, "onlyDefaultVariants": false}"#).unwrap();
        assert_eq!(config.page_size, 10);
        assert!(!config.only_default_variants);
        assert!(config.enable_team_libraries);
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = PaletteConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PaletteError::Config { .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("palette.json");
        std::fs::write(&path, r#"{"pageSize": 25, "maxPagesToLoad": 2}"#).unwrap();

        let config = PaletteConfig::from_json_file(&path).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.max_pages_to_load, 2);
    }

    #[test]
    fn test_from_json_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = PaletteConfig::from_json_file(&temp_dir.path().join("missing.json"));
        assert!(matches!(result, Err(PaletteError::Io { path: Some(_), .. })));
    }
}

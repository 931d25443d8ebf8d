//! Configuration management for tilebox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use tilebox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Seeding with {} workers", config.executor.workers);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `TILEBOX__<section>__<key>`
//!
//! Examples:
//! - `TILEBOX__EXECUTOR__WORKERS=16`
//! - `TILEBOX__EXECUTOR__METATILING=8x8`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/tilebox.toml`.
//! This can be overridden using the `TILEBOX_CONFIG` environment variable.
//!
//! ```toml
//! [executor]
//! workers = 4
//! metatiling = "4x4"
//!
//! [layers.roads]
//! formats = ["image/png"]
//!
//! [[layers.roads.grid_subsets]]
//! gridset = "EPSG:900913"
//! zoom_stop = 18
//! ```

mod models;
mod sources;
mod validation;

pub use models::{Config, ExecutorConfig, GridSubsetConfig, GridsetConfig, LayerConfig};
pub use validation::ValidationError;

use crate::error::TilingError;
use crate::grid::{LayerCatalog, TileLayerInfo};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to build layer catalog: {0}")]
    CatalogError(#[from] TilingError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`TILEBOX__*`)
    /// 2. TOML file (default: `config/tilebox.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (unknown gridsets, bad zoom ranges, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Layer metadata for the job builder and executor.
    ///
    /// Layers without their own metatiling use `executor.metatiling`.
    /// Formats are matched in lower case.
    pub fn layer_catalog(&self) -> Result<LayerCatalog, ConfigError> {
        let gridsets = self.gridsets()?;
        let mut catalog = LayerCatalog::new();

        for (name, layer_config) in &self.layers {
            let meta_tiling = layer_config
                .metatiling
                .unwrap_or(self.executor.metatiling);
            let mut layer = TileLayerInfo::new(name.as_str(), meta_tiling)
                .with_formats(&layer_config.formats);

            for subset_config in &layer_config.grid_subsets {
                let gridset = gridsets.get(&subset_config.gridset).ok_or_else(|| {
                    ValidationError::UnknownGridset {
                        layer: name.clone(),
                        gridset: subset_config.gridset.clone(),
                    }
                })?;
                layer = layer.with_grid_subset(subset_config.to_grid_subset(gridset.clone())?);
            }

            catalog.insert(layer);
            catalog.insert_parameter_ids(name, layer_config.parameter_ids.iter().cloned());
        }

        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridSubset, TileLayerResolver};
    use crate::humanize::MetaTileSize;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[layers.roads]
formats = ["image/png"]

[[layers.roads.grid_subsets]]
gridset = "EPSG:4326"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.layers.len(), 1);
        assert!(config.gridsets.is_empty());
    }

    #[test]
    fn test_validation_catches_missing_gridset() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[layers.roads]
formats = ["image/png"]

[[layers.roads.grid_subsets]]
gridset = "nonexistent"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::UnknownGridset { .. })
        ));
    }

    #[test]
    fn test_layer_catalog_integration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[executor]
metatiling = "2x2"

[gridsets.local]
extent = [0.0, 0.0, 1000.0, 1000.0]
levels = 6

[layers.roads]
formats = ["Image/PNG"]
parameter_ids = ["abc", "def"]

[[layers.roads.grid_subsets]]
gridset = "EPSG:4326"
zoom_stop = 10

[[layers.roads.grid_subsets]]
gridset = "local"

[layers.rivers]
formats = ["image/jpeg"]
metatiling = "1x1"

[[layers.rivers.grid_subsets]]
gridset = "EPSG:900913"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        let catalog = config.layer_catalog().unwrap();
        assert_eq!(catalog.len(), 2);

        let roads = catalog.layer("roads").unwrap();
        assert_eq!(roads.meta_tiling(), MetaTileSize::new(2, 2).unwrap());
        assert!(roads.supports_format("image/png"));
        assert_eq!(
            roads.grid_subset_names().collect::<Vec<_>>(),
            vec!["EPSG:4326", "local"]
        );
        let subset = roads.grid_subset("EPSG:4326").unwrap();
        assert_eq!(subset.max_zoom_level(), 10);
        assert_eq!(roads.grid_subset("local").unwrap().max_zoom_level(), 5);
        assert_eq!(catalog.parameter_ids("roads").len(), 2);

        let rivers = catalog.layer("rivers").unwrap();
        assert_eq!(rivers.meta_tiling(), MetaTileSize::SINGLE);
        assert_eq!(rivers.grid_subset("EPSG:900913").unwrap().max_zoom_level(), 30);
    }
}

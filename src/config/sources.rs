use super::models::Config;
use config::{ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "TILEBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/tilebox.toml";
const ENV_PREFIX: &str = "TILEBOX";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration");
        builder = builder.add_source(
            File::from(config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    } else {
        tracing::debug!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // TILEBOX__EXECUTOR__WORKERS -> executor.workers
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::MetaTileSize;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.executor.workers, 4);
        assert_eq!(config.executor.channel_size, 64);
        assert_eq!(config.executor.metatiling, MetaTileSize::default());
        assert!(config.layers.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[executor]
workers = 8
metatiling = "2x1"

[gridsets.local]
extent = [0.0, 0.0, 1000.0, 500.0]
tiles_wide = 2
tiles_high = 1
levels = 10
srs = "EPSG:32633"

[layers.roads]
formats = ["image/png", "image/jpeg"]
metatiling = "8x8"
parameter_ids = ["abc"]

[[layers.roads.grid_subsets]]
gridset = "EPSG:4326"
zoom_stop = 12

[[layers.roads.grid_subsets]]
gridset = "local"
extent = [0.0, 0.0, 500.0, 500.0]
min_cached_zoom_level = 2
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.executor.workers, 8);
        assert_eq!(config.executor.channel_size, 64);
        assert_eq!(config.executor.metatiling, MetaTileSize::new(2, 1).unwrap());

        let local = &config.gridsets["local"];
        assert_eq!(local.tiles_wide, 2);
        assert_eq!(local.srs.as_deref(), Some("EPSG:32633"));

        let roads = &config.layers["roads"];
        assert_eq!(roads.formats.len(), 2);
        assert_eq!(roads.metatiling, Some(MetaTileSize::new(8, 8).unwrap()));
        assert_eq!(roads.grid_subsets.len(), 2);
        assert_eq!(roads.grid_subsets[0].zoom_stop, Some(12));
        assert_eq!(roads.grid_subsets[1].min_cached_zoom_level, Some(2));
        assert_eq!(
            roads.grid_subsets[1].extent.as_deref(),
            Some(&[0.0, 0.0, 500.0, 500.0][..])
        );
    }

    #[test]
    fn test_square_metatiling_as_number() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[executor]\nmetatiling = 3\n").unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.executor.metatiling, MetaTileSize::new(3, 3).unwrap());
    }
}

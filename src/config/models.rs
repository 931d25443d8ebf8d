use crate::error::TilingError;
use crate::grid::{BoundingBox, GridSubsetInfo, Gridset};
use crate::humanize::MetaTileSize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// User gridsets, by name. The built-in gridsets are always available.
    #[serde(default)]
    pub gridsets: BTreeMap<String, GridsetConfig>,
    #[serde(default)]
    pub layers: BTreeMap<String, LayerConfig>,
}

/// Job execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bound of each worker's metatile channel
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
    /// Metatiling for layers that do not set their own
    #[serde(default)]
    pub metatiling: MetaTileSize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_size: default_channel_size(),
            metatiling: MetaTileSize::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_channel_size() -> usize {
    64
}

/// A tile matrix set: level 0 is `tiles_wide` x `tiles_high`, each
/// further level doubles both sides.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridsetConfig {
    /// `[minx, miny, maxx, maxy]`
    pub extent: Vec<f64>,
    #[serde(default = "default_tiles_per_side")]
    pub tiles_wide: u64,
    #[serde(default = "default_tiles_per_side")]
    pub tiles_high: u64,
    #[serde(default = "default_levels")]
    pub levels: u32,
    #[serde(default)]
    pub srs: Option<String>,
}

fn default_tiles_per_side() -> u64 {
    1
}

fn default_levels() -> u32 {
    20
}

impl GridsetConfig {
    pub fn to_gridset(&self, name: &str) -> Result<Gridset, TilingError> {
        let extent = BoundingBox::from_slice(&self.extent)?;
        let gridset = Gridset::new(name, extent, self.tiles_wide, self.tiles_high, self.levels)?;
        Ok(match &self.srs {
            Some(srs) => gridset.with_srs(srs),
            None => gridset,
        })
    }
}

/// A cached layer
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LayerConfig {
    /// MIME types the layer is cached in
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub metatiling: Option<MetaTileSize>,
    /// Parameter filter ids the cache already holds tiles for
    #[serde(default)]
    pub parameter_ids: Vec<String>,
    #[serde(default)]
    pub grid_subsets: Vec<GridSubsetConfig>,
}

/// A layer's coverage of one gridset
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridSubsetConfig {
    pub gridset: String,
    #[serde(default)]
    pub extent: Option<Vec<f64>>,
    #[serde(default)]
    pub zoom_start: Option<i32>,
    #[serde(default)]
    pub zoom_stop: Option<i32>,
    #[serde(default)]
    pub min_cached_zoom_level: Option<i32>,
    #[serde(default)]
    pub max_cached_zoom_level: Option<i32>,
}

impl GridSubsetConfig {
    pub fn to_grid_subset(&self, gridset: Arc<Gridset>) -> Result<GridSubsetInfo, TilingError> {
        let zoom_start = self.zoom_start.unwrap_or(0);
        let zoom_stop = self.zoom_stop.unwrap_or(gridset.max_zoom_level());

        let mut subset = GridSubsetInfo::new(gridset);
        if let Some(extent) = &self.extent {
            subset = subset.with_extent(BoundingBox::from_slice(extent)?)?;
        }
        subset
            .with_zoom_range(zoom_start, zoom_stop)?
            .with_cached_zoom_levels(self.min_cached_zoom_level, self.max_cached_zoom_level)
    }
}

impl Config {
    /// Built-in gridsets overlaid with the configured ones.
    pub fn gridsets(&self) -> Result<BTreeMap<String, Arc<Gridset>>, TilingError> {
        let mut gridsets: BTreeMap<String, Arc<Gridset>> = Gridset::builtins()
            .into_iter()
            .map(|gridset| (gridset.name().to_string(), Arc::new(gridset)))
            .collect();
        for (name, gridset) in &self.gridsets {
            gridsets.insert(name.clone(), Arc::new(gridset.to_gridset(name)?));
        }
        Ok(gridsets)
    }
}

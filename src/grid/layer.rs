use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::subset::GridSubset;
use crate::humanize::MetaTileSize;

/// What the cache needs to know about a tile layer.
#[derive(Debug, Clone)]
pub struct TileLayerInfo {
    name: String,
    formats: BTreeSet<String>,
    grid_subsets: BTreeMap<String, Arc<dyn GridSubset>>,
    meta_tiling: MetaTileSize,
}

impl TileLayerInfo {
    pub fn new(name: impl Into<String>, meta_tiling: MetaTileSize) -> Self {
        Self {
            name: name.into(),
            formats: BTreeSet::new(),
            grid_subsets: BTreeMap::new(),
            meta_tiling,
        }
    }

    /// MIME types are stored trimmed and lower-cased.
    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.formats.extend(
            formats
                .into_iter()
                .map(|format| format.as_ref().trim().to_ascii_lowercase()),
        );
        self
    }

    /// Keyed by the subset's gridset id; a later subset for the same
    /// gridset replaces the earlier one.
    pub fn with_grid_subset(mut self, subset: impl GridSubset + 'static) -> Self {
        self.grid_subsets
            .insert(subset.name().to_string(), Arc::new(subset));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formats(&self) -> &BTreeSet<String> {
        &self.formats
    }

    pub fn supports_format(&self, format: &str) -> bool {
        self.formats.contains(format)
    }

    pub fn grid_subset(&self, gridset_id: &str) -> Option<&dyn GridSubset> {
        self.grid_subsets.get(gridset_id).map(|subset| subset.as_ref())
    }

    pub fn grid_subset_names(&self) -> impl Iterator<Item = &str> {
        self.grid_subsets.keys().map(String::as_str)
    }

    pub fn meta_tiling(&self) -> MetaTileSize {
        self.meta_tiling
    }
}

/// Looks up layer metadata by name.
pub trait TileLayerResolver: Send + Sync {
    fn layer(&self, name: &str) -> Option<Arc<TileLayerInfo>>;

    /// Parameter-filter ids the cache already holds tiles for.
    fn parameter_ids(&self, _layer: &str) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// In-memory [`TileLayerResolver`].
#[derive(Debug, Clone, Default)]
pub struct LayerCatalog {
    layers: BTreeMap<String, Arc<TileLayerInfo>>,
    parameter_ids: BTreeMap<String, BTreeSet<String>>,
}

impl LayerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer: TileLayerInfo) {
        self.layers
            .insert(layer.name().to_string(), Arc::new(layer));
    }

    pub fn insert_parameter_ids<I, S>(&mut self, layer: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_ids
            .entry(layer.to_string())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl TileLayerResolver for LayerCatalog {
    fn layer(&self, name: &str) -> Option<Arc<TileLayerInfo>> {
        self.layers.get(name).cloned()
    }

    fn parameter_ids(&self, layer: &str) -> BTreeSet<String> {
        self.parameter_ids.get(layer).cloned().unwrap_or_default()
    }
}

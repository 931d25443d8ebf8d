use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use super::identifier::{CacheIdentifier, parameters_id};
use super::request::{Action, CacheJobRequest};
use crate::error::{Result, TilingError};
use crate::grid::{BoundingBox, TileLayerInfo, TileLayerResolver, TilePyramidBuilder};
use crate::model::TilePyramid;

/// Expands one user request into a [`CacheJobRequest`] per cache of a layer.
///
/// Unless narrowed, a request covers every gridset and format the layer is
/// configured with, and every parameter filter id the cache knows for it
/// (plus the default, unfiltered cache). All requests built together share
/// one timestamp.
#[derive(Clone)]
pub struct CacheJobRequestBuilder {
    resolver: Arc<dyn TileLayerResolver>,
    action: Action,
    layer: Option<String>,
    formats: BTreeSet<String>,
    gridset_id: Option<String>,
    bounds: Option<BoundingBox>,
    parameters: BTreeMap<String, String>,
    parameters_id: Option<String>,
    min_zoom_level: Option<i32>,
    max_zoom_level: Option<i32>,
}

impl CacheJobRequestBuilder {
    pub fn new(resolver: Arc<dyn TileLayerResolver>) -> Self {
        Self {
            resolver,
            action: Action::default(),
            layer: None,
            formats: BTreeSet::new(),
            gridset_id: None,
            bounds: None,
            parameters: BTreeMap::new(),
            parameters_id: None,
            min_zoom_level: None,
            max_zoom_level: None,
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn gridset(mut self, gridset_id: impl Into<String>) -> Self {
        self.gridset_id = Some(gridset_id.into());
        self
    }

    pub fn maybe_gridset(mut self, gridset_id: Option<String>) -> Self {
        self.gridset_id = gridset_id;
        self
    }

    /// Adds a format; may be called repeatedly.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.formats.insert(format.into());
        self
    }

    /// Explicit parameter filter values. Replaces any `parameters_id`.
    pub fn parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self.parameters_id = None;
        self
    }

    /// Explicit parameter filter id. Replaces any `parameters`.
    pub fn parameters_id(mut self, parameters_id: impl Into<String>) -> Self {
        self.parameters_id = Some(parameters_id.into());
        self.parameters.clear();
        self
    }

    pub fn bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn maybe_bounds(mut self, bounds: Option<BoundingBox>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn min_zoom_level(mut self, zoom_level: Option<i32>) -> Self {
        self.min_zoom_level = zoom_level;
        self
    }

    pub fn max_zoom_level(mut self, zoom_level: Option<i32>) -> Self {
        self.max_zoom_level = zoom_level;
        self
    }

    pub fn build(&self) -> Result<Vec<CacheJobRequest>> {
        let timestamp = Utc::now();
        let layer = self.resolve_layer()?;
        let gridsets = self.resolve_gridsets(&layer)?;
        let formats = self.resolve_formats(&layer)?;
        let parameter_ids = self.resolve_parameter_ids(&layer);

        let mut requests =
            Vec::with_capacity(gridsets.len() * formats.len() * parameter_ids.len());
        for gridset_id in &gridsets {
            let tiles = self.resolve_tile_pyramid(&layer, gridset_id)?;
            for format in &formats {
                for parameters_id in &parameter_ids {
                    let cache_id = CacheIdentifier::builder()
                        .layer_name(layer.name())
                        .gridset_id(gridset_id.as_str())
                        .format(format.as_str())
                        .maybe_parameters_id(parameters_id.clone())
                        .build()?;
                    requests.push(CacheJobRequest::new(
                        self.action,
                        cache_id,
                        tiles.clone(),
                        timestamp,
                    ));
                }
            }
        }

        debug!(
            layer = layer.name(),
            action = %self.action,
            requests = requests.len(),
            "Built cache job requests"
        );
        Ok(requests)
    }

    fn resolve_layer(&self) -> Result<Arc<TileLayerInfo>> {
        let name = self
            .layer
            .as_deref()
            .ok_or(TilingError::MissingField("layerName"))?;
        self.resolver
            .layer(name)
            .ok_or_else(|| TilingError::LayerNotFound(name.to_string()))
    }

    fn resolve_gridsets(&self, layer: &TileLayerInfo) -> Result<Vec<String>> {
        match &self.gridset_id {
            None => Ok(layer.grid_subset_names().map(str::to_string).collect()),
            Some(requested) if layer.grid_subset(requested).is_some() => {
                Ok(vec![requested.clone()])
            }
            Some(missing) => Err(TilingError::UnsupportedGridsets(missing.clone())),
        }
    }

    /// Requested formats in the layer's order; all of them when none requested.
    fn resolve_formats(&self, layer: &TileLayerInfo) -> Result<Vec<String>> {
        if self.formats.is_empty() {
            return Ok(layer.formats().iter().cloned().collect());
        }

        let requested = self
            .formats
            .iter()
            .map(|format| validate_format(format))
            .collect::<Result<BTreeSet<_>>>()?;

        let unsupported: Vec<&str> = requested
            .iter()
            .filter(|format| !layer.supports_format(format))
            .map(String::as_str)
            .collect();
        if !unsupported.is_empty() {
            return Err(TilingError::UnsupportedFormats {
                layer: layer.name().to_string(),
                formats: unsupported.join(", "),
            });
        }

        Ok(layer
            .formats()
            .iter()
            .filter(|format| requested.contains(*format))
            .cloned()
            .collect())
    }

    fn resolve_parameter_ids(&self, layer: &TileLayerInfo) -> Vec<Option<String>> {
        if !self.parameters.is_empty() {
            return vec![Some(parameters_id(&self.parameters))];
        }
        if let Some(id) = &self.parameters_id {
            return vec![Some(id.clone())];
        }
        std::iter::once(None)
            .chain(self.resolver.parameter_ids(layer.name()).into_iter().map(Some))
            .collect()
    }

    fn resolve_tile_pyramid(&self, layer: &TileLayerInfo, gridset_id: &str) -> Result<TilePyramid> {
        TilePyramidBuilder::new(layer)
            .gridset(gridset_id)
            .maybe_bounds(self.bounds)
            .maybe_min_zoom_level(self.min_zoom_level)
            .maybe_max_zoom_level(self.max_zoom_level)
            .build()
    }
}

/// Normalizes a MIME type (`type/subtype[;param=value]`) to lower case.
fn validate_format(format: &str) -> Result<String> {
    let normalized = format.trim().to_ascii_lowercase();
    let essence = normalized.split(';').next().unwrap_or_default();
    let valid_token = |token: &str| {
        !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "+-._".contains(c))
    };
    match essence.split_once('/') {
        Some((kind, subtype)) if valid_token(kind) && valid_token(subtype) => Ok(normalized),
        _ => Err(TilingError::InvalidFormat(format.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridSubsetInfo, Gridset, LayerCatalog};
    use crate::humanize::MetaTileSize;

    fn resolver() -> Arc<dyn TileLayerResolver> {
        let layer = TileLayerInfo::new("roads", MetaTileSize::default())
            .with_formats(["image/png", "image/jpeg"])
            .with_grid_subset(
                GridSubsetInfo::new(Arc::new(Gridset::world_epsg4326()))
                    .with_zoom_range(0, 5)
                    .unwrap(),
            )
            .with_grid_subset(
                GridSubsetInfo::new(Arc::new(Gridset::world_epsg900913()))
                    .with_zoom_range(0, 5)
                    .unwrap(),
            );
        let mut catalog = LayerCatalog::new();
        catalog.insert(layer);
        catalog.insert_parameter_ids("roads", ["p1", "p2"]);
        Arc::new(catalog)
    }

    fn ids(requests: &[CacheJobRequest]) -> Vec<String> {
        requests.iter().map(|r| r.cache_id().to_string()).collect()
    }

    #[test]
    fn test_cartesian_product_of_caches() {
        let requests = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .build()
            .unwrap();
        // 2 gridsets x 2 formats x (default + 2 parameter ids)
        assert_eq!(requests.len(), 12);
        assert!(requests.iter().all(|r| r.action() == Action::Seed));
        assert!(
            requests
                .iter()
                .all(|r| r.timestamp() == requests[0].timestamp())
        );
        assert_eq!(
            requests.iter().filter(|r| r.cache_id().parameters_id().is_none()).count(),
            4
        );
    }

    #[test]
    fn test_narrowed_request() {
        let requests = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .action(Action::Truncate)
            .gridset("EPSG:4326")
            .format("IMAGE/PNG")
            .parameters_id("p9")
            .min_zoom_level(Some(1))
            .max_zoom_level(Some(2))
            .build()
            .unwrap();
        assert_eq!(ids(&requests), vec!["roads/EPSG:4326/image/png/p9"]);
        let tiles = requests[0].tiles();
        assert_eq!(tiles.min_zoom_level(), Some(1));
        assert_eq!(tiles.max_zoom_level(), Some(2));
        assert_eq!(requests[0].action(), Action::Truncate);
    }

    #[test]
    fn test_parameters_and_parameters_id_last_one_wins() {
        let mut params = BTreeMap::new();
        params.insert("STYLES".to_string(), "night".to_string());

        let by_params = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .gridset("EPSG:4326")
            .format("image/png")
            .parameters_id("p1")
            .parameters(params.clone())
            .build()
            .unwrap();
        assert_eq!(
            by_params[0].cache_id().parameters_id(),
            Some(parameters_id(&params).as_str())
        );

        let by_id = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .gridset("EPSG:4326")
            .format("image/png")
            .parameters(params)
            .parameters_id("p1")
            .build()
            .unwrap();
        assert_eq!(by_id[0].cache_id().parameters_id(), Some("p1"));
    }

    #[test]
    fn test_unknown_layer_and_gridset() {
        let err = CacheJobRequestBuilder::new(resolver())
            .layer("rivers")
            .build()
            .unwrap_err();
        assert_eq!(err, TilingError::LayerNotFound("rivers".into()));

        let err = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .gridset("EPSG:3857")
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Layer is not configured for the following GridSets: EPSG:3857"
        );

        assert_eq!(
            CacheJobRequestBuilder::new(resolver()).build().unwrap_err(),
            TilingError::MissingField("layerName")
        );
    }

    #[test]
    fn test_format_errors() {
        let err = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .format("image/png")
            .format("image/gif")
            .format("application/json")
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The following formats are not supported by layer roads: application/json, image/gif"
        );

        let err = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .format("png")
            .build()
            .unwrap_err();
        assert_eq!(err, TilingError::InvalidFormat("png".into()));
    }

    #[test]
    fn test_mixed_case_layer_formats_match() {
        let layer = TileLayerInfo::new("rivers", MetaTileSize::default())
            .with_formats(["image/PNG"])
            .with_grid_subset(GridSubsetInfo::new(Arc::new(Gridset::world_epsg4326())));
        let mut catalog = LayerCatalog::new();
        catalog.insert(layer);

        let requests = CacheJobRequestBuilder::new(Arc::new(catalog))
            .layer("rivers")
            .format("image/png")
            .max_zoom_level(Some(1))
            .build()
            .unwrap();
        assert_eq!(ids(&requests), vec!["rivers/EPSG:4326/image/png"]);
    }

    #[test]
    fn test_zoom_errors_propagate() {
        let err = CacheJobRequestBuilder::new(resolver())
            .layer("roads")
            .max_zoom_level(Some(9))
            .build()
            .unwrap_err();
        assert!(matches!(err, TilingError::ZoomLevelOutOfBounds { bound: "max", .. }));
    }

    #[test]
    fn test_validate_format() {
        assert_eq!(validate_format(" Image/PNG ").unwrap(), "image/png");
        assert_eq!(
            validate_format("image/png;mode=8bit").unwrap(),
            "image/png;mode=8bit"
        );
        assert!(validate_format("image/").is_err());
        assert!(validate_format("image png").is_err());
    }
}

use super::models::Config;
use crate::error::TilingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("executor.workers must be at least 1")]
    NoWorkers,

    #[error("executor.channel_size must be at least 1")]
    NoChannelCapacity,

    #[error("Gridset '{name}' is invalid: {source}")]
    InvalidGridset { name: String, source: TilingError },

    #[error("Layer '{layer}' has no formats configured")]
    NoFormats { layer: String },

    #[error("Layer '{layer}' has no grid subsets configured")]
    NoGridSubsets { layer: String },

    #[error("Layer '{layer}' references non-existent gridset '{gridset}'")]
    UnknownGridset { layer: String, gridset: String },

    #[error("Layer '{layer}' grid subset '{gridset}' is invalid: {source}")]
    InvalidGridSubset {
        layer: String,
        gridset: String,
        source: TilingError,
    },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_executor(config)?;
    validate_layers(config)?;
    Ok(())
}

fn validate_executor(config: &Config) -> Result<(), ValidationError> {
    if config.executor.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.executor.channel_size == 0 {
        return Err(ValidationError::NoChannelCapacity);
    }
    Ok(())
}

/// Every layer needs formats and grid subsets that fit their gridsets.
fn validate_layers(config: &Config) -> Result<(), ValidationError> {
    for (name, gridset) in &config.gridsets {
        gridset
            .to_gridset(name)
            .map_err(|source| ValidationError::InvalidGridset {
                name: name.clone(),
                source,
            })?;
    }
    // all user gridsets are valid at this point
    let gridsets = config
        .gridsets()
        .map_err(|source| ValidationError::InvalidGridset {
            name: "<unknown>".into(),
            source,
        })?;

    for (layer, layer_config) in &config.layers {
        if layer_config.formats.is_empty() {
            return Err(ValidationError::NoFormats {
                layer: layer.clone(),
            });
        }
        if layer_config.grid_subsets.is_empty() {
            return Err(ValidationError::NoGridSubsets {
                layer: layer.clone(),
            });
        }

        for subset in &layer_config.grid_subsets {
            let gridset = gridsets.get(&subset.gridset).ok_or_else(|| {
                ValidationError::UnknownGridset {
                    layer: layer.clone(),
                    gridset: subset.gridset.clone(),
                }
            })?;
            subset
                .to_grid_subset(gridset.clone())
                .map_err(|source| ValidationError::InvalidGridSubset {
                    layer: layer.clone(),
                    gridset: subset.gridset.clone(),
                    source,
                })?;
        }
    }

    Ok(())
}

use thiserror::Error;

/// Errors raised by the tile model, the pyramid builder and the job value objects.
///
/// Every failure is local and deterministic: the same inputs always produce
/// the same error, and nothing is clamped or corrected silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TilingError {
    #[error("invalid tile range: {0}")]
    InvalidRange(String),

    #[error("{dimension} must be > 0, got {value}")]
    InvalidMetaTileSize { dimension: &'static str, value: u32 },

    #[error("invalid zoom level range: min ({min}) must be >= 0 and <= max ({max})")]
    InvalidZoomRange { min: i32, max: i32 },

    #[error("{bound} zoom level {requested} is out of bounds, allowed {bound} is {allowed}")]
    ZoomLevelOutOfBounds {
        bound: &'static str,
        requested: i32,
        allowed: i32,
    },

    #[error("more than one tile range for zoom level {0}")]
    DuplicateZoomLevel(i32),

    #[error("invalid bounding box: {0}")]
    InvalidBounds(String),

    #[error("invalid gridset '{name}': {reason}")]
    InvalidGridset { name: String, reason: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("cannot merge status of job {actual} into job {expected}")]
    JobMismatch { expected: String, actual: String },

    #[error("layer '{0}' couldn't be resolved")]
    LayerNotFound(String),

    #[error("layer '{layer}' has no grid subset '{gridset}'")]
    GridSubsetNotFound { layer: String, gridset: String },

    #[error("Layer is not configured for the following GridSets: {0}")]
    UnsupportedGridsets(String),

    #[error("The following formats are not supported by layer {layer}: {formats}")]
    UnsupportedFormats { layer: String, formats: String },

    #[error("Unsupported format: '{0}'")]
    InvalidFormat(String),

    #[error("unknown action '{0}', expected SEED, RESEED or TRUNCATE")]
    UnknownAction(String),
}

impl TilingError {
    /// True for the invalid-argument family: missing or malformed input and
    /// out-of-bounds requests, as opposed to lookups that found nothing.
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(
            self,
            TilingError::LayerNotFound(_) | TilingError::GridSubsetNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TilingError>;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::identifier::CacheIdentifier;
use crate::error::{Result, TilingError};
use crate::model::TilePyramid;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Render tiles missing from the cache.
    #[default]
    Seed,
    /// Render every tile, overwriting cached ones.
    Reseed,
    /// Delete cached tiles.
    Truncate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Seed => "SEED",
            Action::Reseed => "RESEED",
            Action::Truncate => "TRUNCATE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = TilingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SEED" => Ok(Action::Seed),
            "RESEED" => Ok(Action::Reseed),
            "TRUNCATE" => Ok(Action::Truncate),
            _ => Err(TilingError::UnknownAction(s.to_string())),
        }
    }
}

/// What to do, to which cache, over which tiles. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheJobRequest {
    action: Action,
    cache_id: CacheIdentifier,
    tiles: TilePyramid,
    timestamp: DateTime<Utc>,
}

impl CacheJobRequest {
    pub fn new(
        action: Action,
        cache_id: CacheIdentifier,
        tiles: TilePyramid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            cache_id,
            tiles,
            timestamp,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn cache_id(&self) -> &CacheIdentifier {
        &self.cache_id
    }

    pub fn tiles(&self) -> &TilePyramid {
        &self.tiles
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// An accepted [`CacheJobRequest`] with its job id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCacheJobInfo")]
pub struct CacheJobInfo {
    id: String,
    request: CacheJobRequest,
}

#[derive(Deserialize)]
struct RawCacheJobInfo {
    id: String,
    request: CacheJobRequest,
}

impl TryFrom<RawCacheJobInfo> for CacheJobInfo {
    type Error = TilingError;

    fn try_from(raw: RawCacheJobInfo) -> Result<Self> {
        Self::new(raw.id, raw.request)
    }
}

impl CacheJobInfo {
    pub fn new(id: impl Into<String>, request: CacheJobRequest) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TilingError::MissingField("id"));
        }
        Ok(Self { id, request })
    }

    /// Assigns a fresh time-ordered (UUIDv7) id.
    pub fn generate(request: CacheJobRequest) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            request,
        }
    }

    /// Same request under a different id.
    pub fn with_id(&self, id: impl Into<String>) -> Result<Self> {
        Self::new(id, self.request.clone())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &CacheJobRequest {
        &self.request
    }
}

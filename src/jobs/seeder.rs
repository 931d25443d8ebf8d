use async_trait::async_trait;
use num_traits::ToPrimitive;
use thiserror::Error;

use super::identifier::CacheIdentifier;
use super::request::Action;
use super::statistics::CacheJobStatistics;
use crate::model::{TileIndex3D, TileRange3D};

/// Seeder errors
#[derive(Debug, Error)]
pub enum SeedError {
    /// The metatile could not be processed; the job carries on.
    #[error("seeding failed: {0}")]
    Failed(String),
    /// The seeder cannot go on; no further metatiles are dispatched.
    #[error("fatal seeder error: {0}")]
    Fatal(String),
}

/// One unit of work: a metatile of one job's cache.
#[derive(Debug, Clone)]
pub struct MetaTileRequest {
    pub job_id: String,
    pub seq: u64,
    pub action: Action,
    pub cache_id: CacheIdentifier,
    pub metatile: TileRange3D,
}

impl MetaTileRequest {
    pub fn tiles(&self) -> impl Iterator<Item = TileIndex3D> + use<> {
        self.metatile.as_tiles()
    }

    pub fn tile_count(&self) -> u64 {
        self.metatile.count().to_u64().unwrap_or(u64::MAX)
    }
}

/// Renders or deletes the tiles of one metatile.
///
/// Implementations report what they did as a [`CacheJobStatistics`] delta;
/// the executor merges deltas into the job status.
#[async_trait]
pub trait TileSeeder: Send + Sync {
    /// Render the tiles missing from the cache
    async fn seed(&self, request: &MetaTileRequest) -> Result<CacheJobStatistics, SeedError>;

    /// Render every tile, replacing cached ones
    async fn reseed(&self, request: &MetaTileRequest) -> Result<CacheJobStatistics, SeedError>;

    /// Delete cached tiles
    async fn truncate(&self, request: &MetaTileRequest) -> Result<CacheJobStatistics, SeedError>;

    async fn process(&self, request: &MetaTileRequest) -> Result<CacheJobStatistics, SeedError> {
        match request.action {
            Action::Seed => self.seed(request).await,
            Action::Reseed => self.reseed(request).await,
            Action::Truncate => self.truncate(request).await,
        }
    }
}

/// Touches nothing and reports every tile as skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSeeder;

#[async_trait]
impl TileSeeder for DryRunSeeder {
    async fn seed(&self, request: &MetaTileRequest) -> Result<CacheJobStatistics, SeedError> {
        Ok(CacheJobStatistics::skipped(request.tile_count()))
    }

    async fn reseed(&self, request: &MetaTileRequest) -> Result<CacheJobStatistics, SeedError> {
        Ok(CacheJobStatistics::skipped(request.tile_count()))
    }

    async fn truncate(&self, request: &MetaTileRequest) -> Result<CacheJobStatistics, SeedError> {
        Ok(CacheJobStatistics::skipped(request.tile_count()))
    }
}

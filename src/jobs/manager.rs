use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::dispatch::MetaTileBroker;
use super::error::{JobError, Result};
use super::registry::CacheJobRegistry;
use super::request::{CacheJobInfo, CacheJobRequest};
use super::request_builder::CacheJobRequestBuilder;
use super::seeder::{MetaTileRequest, SeedError, TileSeeder};
use super::statistics::CacheJobStatistics;
use super::status::{CacheJobStatus, Status};
use crate::error::TilingError;
use crate::grid::TileLayerResolver;
use crate::humanize::MetaTileSize;
use crate::observability::Metrics;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Runs cache jobs on the current Tokio runtime.
///
/// Each launched job decomposes its pyramid into metatiles using the layer's
/// metatiling and fans them out over a pool of workers that call the
/// [`TileSeeder`]. Progress is visible through [`CacheJobManager::get_job_status`]
/// while the job runs.
pub struct CacheJobManager {
    resolver: Arc<dyn TileLayerResolver>,
    seeder: Arc<dyn TileSeeder>,
    registry: Arc<CacheJobRegistry>,
    metrics: Arc<Metrics>,
    workers: usize,
    channel_size: usize,
    abort_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl CacheJobManager {
    pub fn new(resolver: Arc<dyn TileLayerResolver>, seeder: Arc<dyn TileSeeder>) -> Self {
        Self {
            resolver,
            seeder,
            registry: Arc::new(CacheJobRegistry::new()),
            metrics: Arc::new(Metrics::new()),
            workers: DEFAULT_WORKERS,
            channel_size: DEFAULT_CHANNEL_SIZE,
            abort_flags: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn new_request_builder(&self) -> CacheJobRequestBuilder {
        CacheJobRequestBuilder::new(self.resolver.clone())
    }

    /// Registers the job as `SCHEDULED` and starts it in the background.
    pub fn launch_job(&self, request: CacheJobRequest) -> Result<CacheJobInfo> {
        let runtime = Handle::try_current().map_err(|_| JobError::NoRuntime)?;
        let layer_name = request.cache_id().layer_name();
        let layer = self
            .resolver
            .layer(layer_name)
            .ok_or_else(|| TilingError::LayerNotFound(layer_name.to_string()))?;

        let job_info = CacheJobInfo::generate(request);
        self.registry
            .register(CacheJobStatus::new(job_info.clone()))?;

        let abort = Arc::new(AtomicBool::new(false));
        self.abort_flags
            .lock()
            .insert(job_info.id().to_string(), abort.clone());
        self.metrics.job_launched();

        info!(
            job_id = %job_info.id(),
            cache_id = %job_info.request().cache_id(),
            action = %job_info.request().action(),
            "Cache job launched"
        );

        let run = JobRun {
            job_info: job_info.clone(),
            meta_tiling: layer.meta_tiling(),
            seeder: self.seeder.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            workers: self.workers,
            channel_size: self.channel_size,
            abort,
        };
        runtime.spawn(run.execute());

        Ok(job_info)
    }

    pub fn get_jobs(&self) -> Vec<CacheJobStatus> {
        self.registry.get_all()
    }

    pub fn get_job_status(&self, job_id: &str) -> Result<CacheJobStatus> {
        self.registry
            .get(job_id)
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()))
    }

    /// Asks a job to stop. Aborting a job that is already aborting or
    /// finished returns its current status unchanged.
    pub fn abort_job(&self, job_id: &str) -> Result<CacheJobStatus> {
        let status = self.registry.update(job_id, |current| {
            (!current.is_finished() && current.status() != Status::Aborting)
                .then_some(Status::Aborting)
        })?;
        if let Some(flag) = self.abort_flags.lock().get(job_id) {
            flag.store(true, Ordering::Release);
        }
        info!(job_id, status = %status.status(), "Abort requested");
        Ok(status)
    }

    pub fn abort_all_jobs(&self) -> Vec<CacheJobStatus> {
        self.registry
            .get_all_alive()
            .iter()
            .filter_map(|status| match self.abort_job(status.job_id()) {
                Ok(status) => Some(status),
                Err(err) => {
                    debug!(job_id = %status.job_id(), error = %err, "Job vanished before abort");
                    None
                }
            })
            .collect()
    }

    /// Forgets finished jobs, returning their last status.
    pub fn prune_jobs(&self) -> Vec<CacheJobStatus> {
        let removed = self.registry.remove_finished();
        let mut flags = self.abort_flags.lock();
        for status in &removed {
            flags.remove(status.job_id());
        }
        debug!(pruned = removed.len(), "Pruned finished jobs");
        removed
    }

    /// Waits until the job reaches a finished state.
    pub async fn await_termination(
        &self,
        job_id: &str,
        timeout: Duration,
    ) -> Result<CacheJobStatus> {
        let wait = async {
            loop {
                // registered before the check so a change in between is not missed
                let changed = self.registry.changed();
                let status = self.get_job_status(job_id)?;
                if status.is_finished() {
                    return Ok::<_, JobError>(status);
                }
                changed.await;
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| JobError::Timeout {
                job_id: job_id.to_string(),
                waited: timeout,
            })?
    }
}

/// Everything a running job needs, detached from the manager.
struct JobRun {
    job_info: CacheJobInfo,
    meta_tiling: MetaTileSize,
    seeder: Arc<dyn TileSeeder>,
    registry: Arc<CacheJobRegistry>,
    metrics: Arc<Metrics>,
    workers: usize,
    channel_size: usize,
    abort: Arc<AtomicBool>,
}

impl JobRun {
    async fn execute(self) {
        let job_id = self.job_info.id().to_string();

        let started = match self.registry.update(&job_id, |current| {
            (current.status() == Status::Scheduled).then_some(Status::Running)
        }) {
            Ok(status) => status.status() == Status::Running,
            Err(err) => {
                error!(job_id = %job_id, error = %err, "Could not start job");
                return;
            }
        };

        let halted = if started {
            self.run_workers(&job_id).await
        } else {
            false
        };
        self.finish(&job_id, halted);
    }

    /// Returns true when seeding stopped on a fatal error.
    async fn run_workers(&self, job_id: &str) -> bool {
        let (broker, receivers) = MetaTileBroker::new(self.workers, self.channel_size);
        let halted = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = receivers
            .into_iter()
            .enumerate()
            .map(|(worker_id, rx)| {
                let worker = Worker {
                    worker_id,
                    seeder: self.seeder.clone(),
                    registry: self.registry.clone(),
                    abort: self.abort.clone(),
                    halted: halted.clone(),
                };
                tokio::spawn(worker.run(rx))
            })
            .collect();

        let request = self.job_info.request();
        match request
            .tiles()
            .as_meta_tiles(self.meta_tiling.width(), self.meta_tiling.height())
        {
            Ok(metatiles) => {
                for (seq, metatile) in (0u64..).zip(metatiles) {
                    if self.abort.load(Ordering::Acquire) || halted.load(Ordering::Acquire) {
                        debug!(job_id, seq, "Dispatch stopped");
                        break;
                    }
                    let delivered = broker
                        .dispatch(MetaTileRequest {
                            job_id: job_id.to_string(),
                            seq,
                            action: request.action(),
                            cache_id: request.cache_id().clone(),
                            metatile,
                        })
                        .await;
                    if !delivered {
                        halted.store(true, Ordering::Release);
                        break;
                    }
                    self.metrics.metatile_dispatched();
                }
            }
            Err(err) => {
                error!(job_id, error = %err, "Could not decompose tile pyramid");
                halted.store(true, Ordering::Release);
            }
        }

        drop(broker);
        for handle in handles {
            if let Err(err) = handle.await {
                error!(job_id, error = %err, "Worker task failed");
                halted.store(true, Ordering::Release);
            }
        }

        halted.load(Ordering::Acquire)
    }

    fn finish(&self, job_id: &str, halted: bool) {
        let result = self.registry.update(job_id, |current| {
            if current.is_finished() {
                return None;
            }
            Some(match current.status() {
                Status::Aborting => Status::Aborted,
                _ if halted || current.stats().tiles_failed() > 0 => Status::Failed,
                _ => Status::Complete,
            })
        });

        match result {
            Ok(status) => {
                match status.status() {
                    Status::Complete => self.metrics.job_completed(),
                    Status::Aborted => self.metrics.job_aborted(),
                    Status::Failed => self.metrics.job_failed(),
                    _ => {}
                }
                let stats = status.stats();
                info!(
                    job_id,
                    status = %status.status(),
                    tiles_created = stats.tiles_created(),
                    tiles_skipped = stats.tiles_skipped(),
                    tiles_failed = stats.tiles_failed(),
                    "Cache job finished"
                );
            }
            Err(err) => error!(job_id, error = %err, "Could not finish job"),
        }
    }
}

struct Worker {
    worker_id: usize,
    seeder: Arc<dyn TileSeeder>,
    registry: Arc<CacheJobRegistry>,
    abort: Arc<AtomicBool>,
    halted: Arc<AtomicBool>,
}

impl Worker {
    /// Drains the channel; once the job is aborted or halted, remaining
    /// metatiles are dropped unprocessed.
    async fn run(self, mut rx: mpsc::Receiver<MetaTileRequest>) {
        while let Some(request) = rx.recv().await {
            if self.abort.load(Ordering::Acquire) || self.halted.load(Ordering::Acquire) {
                continue;
            }

            let delta = match self.seeder.process(&request).await {
                Ok(stats) => stats,
                Err(err @ SeedError::Failed(_)) => {
                    warn!(
                        job_id = %request.job_id,
                        seq = request.seq,
                        zoom_level = request.metatile.zoom_level(),
                        error = %err,
                        "Metatile failed"
                    );
                    CacheJobStatistics::failed(request.tile_count())
                }
                Err(err @ SeedError::Fatal(_)) => {
                    error!(
                        job_id = %request.job_id,
                        seq = request.seq,
                        error = %err,
                        "Seeder gave up, halting job"
                    );
                    self.halted.store(true, Ordering::Release);
                    CacheJobStatistics::failed(request.tile_count())
                }
            };

            if let Err(err) = self.registry.merge_statistics(&request.job_id, &delta) {
                warn!(job_id = %request.job_id, error = %err, "Could not record progress");
            } else {
                debug!(
                    job_id = %request.job_id,
                    worker_id = self.worker_id,
                    seq = request.seq,
                    "Metatile processed"
                );
            }
        }
        debug!(worker_id = self.worker_id, "Worker finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridSubsetInfo, Gridset, LayerCatalog, TileLayerInfo};
    use crate::jobs::DryRunSeeder;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    const WAIT: Duration = Duration::from_secs(5);

    fn catalog() -> Arc<LayerCatalog> {
        let layer = TileLayerInfo::new("roads", MetaTileSize::default())
            .with_formats(["image/png"])
            .with_grid_subset(
                GridSubsetInfo::new(Arc::new(Gridset::world_epsg4326()))
                    .with_zoom_range(0, 2)
                    .unwrap(),
            );
        let mut catalog = LayerCatalog::new();
        catalog.insert(layer);
        Arc::new(catalog)
    }

    fn manager(seeder: impl TileSeeder + 'static) -> CacheJobManager {
        CacheJobManager::new(catalog(), Arc::new(seeder))
            .with_workers(2)
            .with_channel_size(1)
    }

    fn request(manager: &CacheJobManager) -> CacheJobRequest {
        manager
            .new_request_builder()
            .layer("roads")
            .build()
            .unwrap()
            .remove(0)
    }

    struct FailingSeeder {
        fatal: bool,
    }

    #[async_trait]
    impl TileSeeder for FailingSeeder {
        async fn seed(&self, _: &MetaTileRequest) -> std::result::Result<CacheJobStatistics, SeedError> {
            if self.fatal {
                Err(SeedError::Fatal("disk full".into()))
            } else {
                Err(SeedError::Failed("render error".into()))
            }
        }

        async fn reseed(&self, request: &MetaTileRequest) -> std::result::Result<CacheJobStatistics, SeedError> {
            self.seed(request).await
        }

        async fn truncate(&self, request: &MetaTileRequest) -> std::result::Result<CacheJobStatistics, SeedError> {
            self.seed(request).await
        }
    }

    /// Blocks every metatile until permits are added.
    struct GatedSeeder {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl TileSeeder for GatedSeeder {
        async fn seed(&self, request: &MetaTileRequest) -> std::result::Result<CacheJobStatistics, SeedError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| SeedError::Fatal(e.to_string()))?;
            permit.forget();
            Ok(CacheJobStatistics::created(request.tile_count()))
        }

        async fn reseed(&self, request: &MetaTileRequest) -> std::result::Result<CacheJobStatistics, SeedError> {
            self.seed(request).await
        }

        async fn truncate(&self, request: &MetaTileRequest) -> std::result::Result<CacheJobStatistics, SeedError> {
            self.seed(request).await
        }
    }

    #[tokio::test]
    async fn test_dry_run_job_completes() {
        let manager = manager(DryRunSeeder);
        let info = manager.launch_job(request(&manager)).unwrap();
        assert_eq!(info.id().len(), 36);

        let status = manager.await_termination(info.id(), WAIT).await.unwrap();
        assert_eq!(status.status(), Status::Complete);
        // z0: 2 tiles, z1: 8, z2: 32
        assert_eq!(*status.stats(), CacheJobStatistics::skipped(42));

        let metrics = manager.metrics().snapshot();
        assert_eq!(metrics.jobs_launched, 1);
        assert_eq!(metrics.jobs_completed, 1);
        // 4x4 metatiles: one each at z0 and z1, two at z2
        assert_eq!(metrics.metatiles_dispatched, 4);
        assert_eq!(metrics.jobs_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_metatiles_fail_the_job() {
        let manager = manager(FailingSeeder { fatal: false });
        let info = manager.launch_job(request(&manager)).unwrap();

        let status = manager.await_termination(info.id(), WAIT).await.unwrap();
        assert_eq!(status.status(), Status::Failed);
        assert_eq!(*status.stats(), CacheJobStatistics::failed(42));
        assert_eq!(manager.metrics().snapshot().jobs_failed, 1);
    }

    #[tokio::test]
    async fn test_fatal_error_halts_the_job() {
        let manager = manager(FailingSeeder { fatal: true });
        let info = manager.launch_job(request(&manager)).unwrap();

        let status = manager.await_termination(info.id(), WAIT).await.unwrap();
        assert_eq!(status.status(), Status::Failed);
        assert!(status.stats().tiles_failed() > 0);
        assert_eq!(status.stats().tiles_created(), 0);
    }

    #[tokio::test]
    async fn test_abort_before_start() {
        let manager = manager(DryRunSeeder);
        let info = manager.launch_job(request(&manager)).unwrap();

        // the spawned job has not been polled yet on this runtime
        let aborting = manager.abort_job(info.id()).unwrap();
        assert_eq!(aborting.status(), Status::Aborting);
        assert_eq!(manager.abort_job(info.id()).unwrap().status(), Status::Aborting);

        let status = manager.await_termination(info.id(), WAIT).await.unwrap();
        assert_eq!(status.status(), Status::Aborted);
        assert_eq!(status.stats().tiles_processed(), 0);
        assert_eq!(manager.metrics().snapshot().jobs_aborted, 1);

        // aborting a finished job changes nothing
        assert_eq!(manager.abort_job(info.id()).unwrap().status(), Status::Aborted);
    }

    #[tokio::test]
    async fn test_abort_running_job() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = manager(GatedSeeder { gate: gate.clone() });
        let info = manager.launch_job(request(&manager)).unwrap();

        while !manager.get_job_status(info.id()).unwrap().is_running() {
            tokio::task::yield_now().await;
        }
        let aborted = manager.abort_all_jobs();
        assert_eq!(aborted.len(), 1);
        assert_eq!(aborted[0].status(), Status::Aborting);

        gate.add_permits(16);
        let status = manager.await_termination(info.id(), WAIT).await.unwrap();
        assert_eq!(status.status(), Status::Aborted);
        assert!(status.stats().tiles_created() < 42);
    }

    #[tokio::test]
    async fn test_await_termination_times_out() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = manager(GatedSeeder { gate: gate.clone() });
        let info = manager.launch_job(request(&manager)).unwrap();

        let err = manager
            .await_termination(info.id(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Timeout { .. }));

        gate.add_permits(16);
        let status = manager.await_termination(info.id(), WAIT).await.unwrap();
        assert_eq!(status.status(), Status::Complete);
        assert_eq!(*status.stats(), CacheJobStatistics::created(42));
    }

    #[tokio::test]
    async fn test_prune_and_lookup() {
        let manager = manager(DryRunSeeder);
        let first = manager.launch_job(request(&manager)).unwrap();
        let second = manager.launch_job(request(&manager)).unwrap();
        assert_eq!(manager.get_jobs().len(), 2);

        manager.await_termination(first.id(), WAIT).await.unwrap();
        manager.await_termination(second.id(), WAIT).await.unwrap();

        let pruned = manager.prune_jobs();
        assert_eq!(pruned.len(), 2);
        assert!(manager.get_jobs().is_empty());
        assert!(matches!(
            manager.get_job_status(first.id()),
            Err(JobError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_rejects_unknown_layer() {
        let manager = manager(DryRunSeeder);
        let empty = CacheJobManager::new(Arc::new(LayerCatalog::new()), Arc::new(DryRunSeeder));

        let err = empty.launch_job(request(&manager)).unwrap_err();
        assert!(matches!(
            err,
            JobError::Tiling(TilingError::LayerNotFound(name)) if name == "roads"
        ));
        assert!(empty.get_jobs().is_empty());
        assert_eq!(empty.metrics().snapshot().jobs_launched, 0);
    }

    #[test]
    fn test_launch_outside_runtime() {
        let manager = manager(DryRunSeeder);
        let err = manager.launch_job(request(&manager)).unwrap_err();
        assert!(matches!(err, JobError::NoRuntime));
    }
}

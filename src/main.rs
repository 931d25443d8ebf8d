mod cli;

use clap::Parser;
use cli::{Cli, Commands, SeedArgs, SelectionArgs};
use num_bigint::BigUint;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use tilebox::config::Config;
use tilebox::grid::{LayerCatalog, TileLayerResolver};
use tilebox::humanize::format_count;
use tilebox::jobs::{CacheJobManager, CacheJobRequest, CacheJobRequestBuilder, DryRunSeeder};
use tracing::info;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Plan(args) => plan(args)?,
        Commands::Seed(args) => seed(args).await?,
    }

    Ok(())
}

/// Logs go to stderr so stdout only carries command output.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn load_catalog(args: &SelectionArgs) -> Result<(Config, Arc<LayerCatalog>), AnyError> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };
    let catalog = Arc::new(config.layer_catalog()?);
    Ok((config, catalog))
}

fn select(builder: CacheJobRequestBuilder, args: &SelectionArgs) -> CacheJobRequestBuilder {
    let mut builder = builder
        .layer(args.layer.as_str())
        .action(args.action)
        .maybe_gridset(args.gridset.clone())
        .maybe_bounds(args.bbox)
        .min_zoom_level(args.min_zoom)
        .max_zoom_level(args.max_zoom);
    for format in &args.formats {
        builder = builder.format(format.as_str());
    }
    if let Some(id) = &args.parameters_id {
        builder = builder.parameters_id(id.as_str());
    }
    builder
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanEntry {
    cache_id: String,
    action: String,
    min_zoom_level: Option<i32>,
    max_zoom_level: Option<i32>,
    #[serde(serialize_with = "serialize_count")]
    tiles: BigUint,
    #[serde(serialize_with = "serialize_count")]
    meta_tiles: BigUint,
}

/// Counts go out as decimal strings; they can exceed any JSON number.
fn serialize_count<S: Serializer>(count: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(count)
}

fn plan_entry(
    request: &CacheJobRequest,
    catalog: &LayerCatalog,
    args: &SelectionArgs,
) -> Result<PlanEntry, AnyError> {
    let layer_name = request.cache_id().layer_name();
    let meta_tiling = match args.metatile {
        Some(size) => size,
        None => catalog
            .layer(layer_name)
            .map(|layer| layer.meta_tiling())
            .ok_or_else(|| format!("layer '{layer_name}' disappeared from the catalog"))?,
    };
    let tiles = request.tiles();
    Ok(PlanEntry {
        cache_id: request.cache_id().to_string(),
        action: request.action().to_string(),
        min_zoom_level: tiles.min_zoom_level(),
        max_zoom_level: tiles.max_zoom_level(),
        tiles: tiles.count(),
        meta_tiles: tiles.count_meta_tiles(meta_tiling.width(), meta_tiling.height())?,
    })
}

fn plan(args: SelectionArgs) -> Result<(), AnyError> {
    let (_, catalog) = load_catalog(&args)?;
    let requests = select(CacheJobRequestBuilder::new(catalog.clone()), &args).build()?;

    let entries = requests
        .iter()
        .map(|request| plan_entry(request, &catalog, &args))
        .collect::<Result<Vec<_>, _>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        let zooms = match (entry.min_zoom_level, entry.max_zoom_level) {
            (Some(min), Some(max)) => format!("z{min}-z{max}"),
            _ => "empty".to_string(),
        };
        println!(
            "{:<8} {}  {}  {} tiles  {} metatiles",
            entry.action,
            entry.cache_id,
            zooms,
            format_count(&entry.tiles),
            format_count(&entry.meta_tiles),
        );
    }
    Ok(())
}

async fn seed(args: SeedArgs) -> Result<(), AnyError> {
    let selection = &args.selection;
    let (config, catalog) = load_catalog(selection)?;
    let manager = CacheJobManager::new(catalog, Arc::new(DryRunSeeder))
        .with_workers(config.executor.workers)
        .with_channel_size(config.executor.channel_size);

    let requests = select(manager.new_request_builder(), selection).build()?;
    let jobs = requests
        .into_iter()
        .map(|request| manager.launch_job(request))
        .collect::<Result<Vec<_>, _>>()?;

    let timeout = Duration::from_secs(args.timeout_secs);
    let mut statuses = Vec::with_capacity(jobs.len());
    for job in &jobs {
        statuses.push(manager.await_termination(job.id(), timeout).await?);
    }

    if selection.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        for status in &statuses {
            let stats = status.stats();
            println!(
                "{}  {}  {:<8} created={} skipped={} failed={}",
                status.job_id(),
                status.job_info().request().cache_id(),
                status.status(),
                stats.tiles_created(),
                stats.tiles_skipped(),
                stats.tiles_failed(),
            );
        }
    }

    let metrics = manager.metrics().snapshot();
    info!(
        jobs_completed = metrics.jobs_completed,
        jobs_failed = metrics.jobs_failed,
        jobs_aborted = metrics.jobs_aborted,
        metatiles = metrics.metatiles_dispatched,
        "Seeding finished"
    );
    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tilebox::grid::BoundingBox;
use tilebox::humanize::MetaTileSize;
use tilebox::jobs::Action;

#[derive(Parser, Debug)]
#[command(name = "tilebox")]
#[command(about = "Plan and run tile cache jobs", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the cache jobs a selection expands to, with tile counts
    Plan(SelectionArgs),
    /// Run the cache jobs with a dry-run seeder and report their final status
    Seed(SeedArgs),
}

/// Which caches of a layer to work on
#[derive(clap::Args, Debug)]
pub struct SelectionArgs {
    /// Layer name
    #[arg(long)]
    pub layer: String,

    /// Gridset id; all of the layer's gridsets when omitted
    #[arg(long)]
    pub gridset: Option<String>,

    /// MIME type, repeatable; all of the layer's formats when omitted
    #[arg(long = "format")]
    pub formats: Vec<String>,

    #[arg(long, default_value_t = Action::Seed)]
    pub action: Action,

    #[arg(long)]
    pub min_zoom: Option<i32>,

    #[arg(long)]
    pub max_zoom: Option<i32>,

    /// Restrict to `minx,miny,maxx,maxy` in the gridset's coordinates
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,

    /// Parameter filter id; the default cache plus all known ids when omitted
    #[arg(long)]
    pub parameters_id: Option<String>,

    /// Metatile size used for the metatile count, e.g. `4x4`; defaults to the layer's
    #[arg(long)]
    pub metatile: Option<MetaTileSize>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Configuration file; `TILEBOX_CONFIG` or `config/tilebox.toml` when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct SeedArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Seconds to wait for each job
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

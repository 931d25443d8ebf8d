pub mod config;
pub mod error;
pub mod grid;
pub mod humanize;
pub mod jobs;
pub mod model;
pub mod observability;

pub use error::TilingError;

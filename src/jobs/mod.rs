//! Cache jobs: what to seed, reseed or truncate, and how it is tracked.
//!
//! A [`CacheJobRequestBuilder`] turns a layer selection into one
//! [`CacheJobRequest`] per cache. The [`CacheJobManager`] runs each request
//! as a job, fanning metatiles out to a [`TileSeeder`] and keeping the
//! latest [`CacheJobStatus`] in a [`CacheJobRegistry`].

mod dispatch;
mod error;
mod identifier;
mod manager;
mod registry;
mod request;
mod request_builder;
mod seeder;
mod statistics;
mod status;

pub use dispatch::MetaTileBroker;
pub use error::{JobError, Result};
pub use identifier::{CacheIdentifier, parameters_id};
pub use manager::CacheJobManager;
pub use registry::CacheJobRegistry;
pub use request::{Action, CacheJobInfo, CacheJobRequest};
pub use request_builder::CacheJobRequestBuilder;
pub use seeder::{DryRunSeeder, MetaTileRequest, SeedError, TileSeeder};
pub use statistics::CacheJobStatistics;
pub use status::{CacheJobStatus, Status};

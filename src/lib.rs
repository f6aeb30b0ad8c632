//! Core of a hierarchical configuration service: a scheduler thread
//! that owns a version-stamped document graph, a worker pool that
//! composes and serializes configuration values, a content-addressed
//! string pool, and the three-generation cache GC that reclaims them.
//!
//! The wire API, YAML ingestion, tag expansion, file discovery, and
//! metrics export are all external collaborators reached only through
//! the traits in [`interfaces`]; this crate is the pipeline that sits
//! behind them.

pub mod config;
pub mod error;
pub mod gc;
pub mod interfaces;
pub mod logging;
pub mod model;
pub mod queue;
pub mod scheduler;
pub mod string_pool;
pub mod worker;

pub use config::Config;
pub use error::{MhConfigError, Result};
pub use scheduler::Scheduler;
pub use string_pool::StringPool;
pub use worker::WorkerPool;

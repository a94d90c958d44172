// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::context::ExecContext;
pub use crate::error::PipelineError;
pub use crate::model::{IncomingRecord, KeyRange, Record, SecondaryEntry};
pub use crate::pipeline::{Fetcher, Refresher};

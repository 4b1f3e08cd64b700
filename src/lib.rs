//! SmartReturns Engine Library
//!
//! Decides what should happen to a returned retail item (resale, repair,
//! recycle or donate), forecasts recovered value, flags unusual return volumes
//! and scores operational risk.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod ml;
pub mod models;

pub use config::{init_tracing, load_config, EngineConfig};
pub use errors::{ErrorKind, ServiceError};
pub use ml::engine::PredictionEngine;

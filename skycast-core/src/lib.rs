//! Core library for the `skycast` forecasting pipeline.
//!
//! This crate defines:
//! - The variable registry and configuration
//! - The historical data client and its upstream provider abstraction
//! - The forecast engine with per-variable failure isolation
//! - Shared domain models (series, forecast entries, results)
//!
//! It is used by `skycast-cli`, but can also be embedded in other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod forecast;
pub mod model;
pub mod provider;
pub mod status;
pub mod variable;

pub use client::HistoricalDataClient;
pub use config::{Config, EngineConfig, HistoryWindow, ProviderConfig};
pub use error::{FetchError, ModelError, SystemError};
pub use forecast::{ForecastAlgorithm, ForecastEngine};
pub use model::{AccuracyMetrics, ForecastEntry, ForecastResult, Location, Status, TimeSeries};
pub use provider::{HistoricalDataSource, SeriesQuery};
pub use status::{ServiceStatus, service_status};
pub use variable::{VariableDefinition, VariableRegistry};

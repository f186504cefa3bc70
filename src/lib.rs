//! `weather-fanout` - concurrent weather fetch, merge and multi-sink persistence
//!
//! For each requested location, numeric fields from a primary JSON API and a
//! visibility value scraped from an auxiliary forecast page are fetched
//! concurrently and merged into one [`WeatherRecord`]. Batches come back in
//! input order, can be converted between temperature scales, and are fanned
//! out to CSV, SQLite and an HTML map with per-sink outcomes.

pub mod config;
pub mod convert;
pub mod error;
pub mod logging;
pub mod merge;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod sources;

// Re-export core types for public API
pub use config::FetcherConfig;
pub use convert::{celsius_to_fahrenheit, convert, convert_record, fahrenheit_to_celsius};
pub use error::WeatherError;
pub use merge::merge;
pub use models::{
    AuxiliaryObservation, Batch, PrimaryObservation, TemperatureUnit, Visibility, WeatherRecord,
    format_table,
};
pub use persist::{
    CsvSink, FanoutReport, MapSink, PersistenceFanout, Sink, SinkOutcome, SinkSummary, SqliteSink,
};
pub use pipeline::{BatchRun, FetchPipeline};
pub use sources::{
    AuxiliarySource, Coordinates, Geocoder, OpenMeteoGeocoder, OpenWeatherClient, PrimarySource,
    TimeAndDateClient,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherError>;

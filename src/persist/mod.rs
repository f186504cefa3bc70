//! Persistence fan-out
//!
//! A merged batch is written to every registered sink concurrently. Each sink
//! is its own failure domain: one sink failing never prevents or rolls back
//! another, and the caller gets one outcome per sink.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info};

use crate::Result;
use crate::config::FetcherConfig;
use crate::models::WeatherRecord;
use crate::sources::{Geocoder, OpenMeteoGeocoder};

pub mod csv_sink;
pub mod map_sink;
pub mod sqlite_sink;

pub use csv_sink::{CSV_HEADER, CsvSink};
pub use map_sink::MapSink;
pub use sqlite_sink::{CREATE_TABLE, SqliteSink, StoredRow};

/// A destination for merged batches
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in reports and logs
    fn name(&self) -> &str;

    async fn write(&self, batch: &[WeatherRecord]) -> Result<SinkSummary>;
}

/// What a successful sink write did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub written: usize,
    /// Records left out of the output, by location
    pub skipped: Vec<String>,
}

impl SinkSummary {
    #[must_use]
    pub fn written(written: usize) -> Self {
        Self {
            written,
            skipped: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub result: Result<SinkSummary>,
}

impl SinkOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-sink outcomes of one persist call, in sink registration order
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl FanoutReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(SinkOutcome::is_success)
    }

    #[must_use]
    pub fn outcome(&self, sink: &str) -> Option<&SinkOutcome> {
        self.outcomes.iter().find(|outcome| outcome.sink == sink)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SinkOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}

impl fmt::Display for FanoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(summary) if summary.skipped.is_empty() => {
                    writeln!(f, "{:<8} ok, {} records", outcome.sink, summary.written)?;
                }
                Ok(summary) => writeln!(
                    f,
                    "{:<8} ok, {} records, skipped: {}",
                    outcome.sink,
                    summary.written,
                    summary.skipped.join(", ")
                )?,
                Err(e) => writeln!(f, "{:<8} FAILED: {}", outcome.sink, e.user_message())?,
            }
        }
        Ok(())
    }
}

/// Writes batches to a fixed set of sinks
#[derive(Default)]
pub struct PersistenceFanout {
    sinks: Vec<Box<dyn Sink>>,
}

impl PersistenceFanout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// CSV, SQLite and map sinks at the configured output paths
    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let geocoder: Arc<dyn Geocoder> = Arc::new(OpenMeteoGeocoder::new(&config.geocoding)?);

        Ok(Self::new()
            .with_sink(CsvSink::new(&config.output.csv_path))
            .with_sink(SqliteSink::new(&config.output.database_path))
            .with_sink(MapSink::new(&config.output.map_path, geocoder)))
    }

    #[must_use]
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Write `batch` to every sink concurrently and collect every outcome
    pub async fn persist(&self, batch: &[WeatherRecord]) -> FanoutReport {
        info!(
            "Persisting {} records to {} sinks",
            batch.len(),
            self.sinks.len()
        );

        let writes = self.sinks.iter().map(|sink| async move {
            let result = sink.write(batch).await;
            match &result {
                Ok(summary) => info!(
                    sink = sink.name(),
                    written = summary.written,
                    skipped = summary.skipped.len(),
                    "Sink write completed"
                ),
                Err(e) => error!(sink = sink.name(), "Sink write failed: {}", e),
            }
            SinkOutcome {
                sink: sink.name().to_string(),
                result,
            }
        });

        FanoutReport {
            outcomes: join_all(writes).await,
        }
    }
}

//! Fetch pipeline
//!
//! Every location of a batch is submitted to a worker pool at once. A
//! semaphore bounds how many locations are in flight; each location fetches
//! its primary and auxiliary observations concurrently and merges them.
//! Completed records are parked in a slot per input index and released to
//! the consumer in windows of `chunk_size`, strictly in input order.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::Result;
use crate::config::{FetcherConfig, PipelineConfig};
use crate::error::WeatherError;
use crate::merge::merge;
use crate::models::{Batch, WeatherRecord};
use crate::sources::{AuxiliarySource, OpenWeatherClient, PrimarySource, TimeAndDateClient};

type SlotResult = (usize, Result<WeatherRecord>);

/// Orchestrates concurrent per-location fetch and merge
pub struct FetchPipeline {
    primary: Arc<dyn PrimarySource>,
    auxiliary: Arc<dyn AuxiliarySource>,
    max_concurrency: usize,
    chunk_size: usize,
}

impl FetchPipeline {
    /// Build a pipeline over the given sources.
    ///
    /// `config.max_concurrency` bounds the worker pool; `config.chunk_size` is
    /// the release granularity used by [`FetchPipeline::fetch_batch`].
    pub fn new(
        primary: Arc<dyn PrimarySource>,
        auxiliary: Arc<dyn AuxiliarySource>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(WeatherError::validation(
                "Max concurrency must be a positive integer",
            ));
        }
        if config.chunk_size == 0 {
            return Err(WeatherError::validation("Chunk size must be a positive integer"));
        }

        Ok(Self {
            primary,
            auxiliary,
            max_concurrency: config.max_concurrency,
            chunk_size: config.chunk_size,
        })
    }

    /// Build a pipeline backed by the real HTTP sources
    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let primary: Arc<dyn PrimarySource> = Arc::new(OpenWeatherClient::new(&config.primary)?);
        let auxiliary: Arc<dyn AuxiliarySource> =
            Arc::new(TimeAndDateClient::new(&config.auxiliary)?);
        Self::new(primary, auxiliary, &config.pipeline)
    }

    /// Submit every location and return a handle releasing records in order.
    ///
    /// Must be called from within a Tokio runtime. Dropping the returned
    /// [`BatchRun`] aborts any work still in flight.
    pub fn run(&self, locations: Vec<String>, chunk_size: usize) -> Result<BatchRun> {
        if chunk_size == 0 {
            return Err(WeatherError::validation("Chunk size must be a positive integer"));
        }

        info!(
            "Dispatching {} locations (max concurrency {}, chunk size {})",
            locations.len(),
            self.max_concurrency,
            chunk_size
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let slots = vec![None; locations.len()];

        for (index, location) in locations.into_iter().enumerate() {
            let primary = Arc::clone(&self.primary);
            let auxiliary = Arc::clone(&self.auxiliary);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        fetch_location(primary.as_ref(), auxiliary.as_ref(), &location).await
                    }
                    Err(_) => Err(WeatherError::general("worker pool closed")),
                };
                (index, result)
            });
        }

        Ok(BatchRun {
            tasks,
            slots,
            released: 0,
            chunk_size,
            failed: false,
        })
    }

    /// Fetch the whole batch, or fail on the first location that fails
    pub async fn fetch_batch(&self, locations: &[String]) -> Result<Batch> {
        self.run(locations.to_vec(), self.chunk_size)?
            .collect()
            .await
    }
}

async fn fetch_location(
    primary: &dyn PrimarySource,
    auxiliary: &dyn AuxiliarySource,
    location: &str,
) -> Result<WeatherRecord> {
    let (primary_observation, auxiliary_observation) =
        tokio::try_join!(primary.fetch(location), auxiliary.fetch(location))?;
    merge(primary_observation, auxiliary_observation)
}

/// One in-progress pipeline invocation
pub struct BatchRun {
    tasks: JoinSet<SlotResult>,
    slots: Vec<Option<WeatherRecord>>,
    released: usize,
    chunk_size: usize,
    failed: bool,
}

impl BatchRun {
    /// Number of locations in this batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Wait for the next window of records.
    ///
    /// Returns `None` once every record has been released or after a failure
    /// has been reported. The first failing location aborts all outstanding
    /// work and is returned as `Some(Err(..))`.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<WeatherRecord>>> {
        if self.failed || self.released >= self.slots.len() {
            return None;
        }

        let end = (self.released + self.chunk_size).min(self.slots.len());

        while self.slots[self.released..end].iter().any(Option::is_none) {
            let Some(joined) = self.tasks.join_next().await else {
                return Some(Err(
                    self.abort(WeatherError::general("worker pool finished with records missing"))
                ));
            };

            match joined {
                Ok((index, Ok(record))) => {
                    debug!(index, location = %record.location, "record ready");
                    self.slots[index] = Some(record);
                }
                Ok((index, Err(e))) => {
                    error!(index, "Location failed, aborting batch: {}", e);
                    return Some(Err(self.abort(e)));
                }
                Err(join_error) => {
                    error!("Worker task failed, aborting batch: {}", join_error);
                    return Some(Err(self.abort(join_error.into())));
                }
            }
        }

        let chunk: Vec<WeatherRecord> = self.slots[self.released..end]
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        debug!("Releasing records {}..{}", self.released, end);
        self.released = end;

        Some(Ok(chunk))
    }

    /// Drain every chunk into one ordered batch
    pub async fn collect(mut self) -> Result<Batch> {
        let mut batch = Vec::with_capacity(self.slots.len());
        while let Some(chunk) = self.next_chunk().await {
            batch.extend(chunk?);
        }
        Ok(batch)
    }

    /// View the run as a stream of chunks
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<WeatherRecord>>> {
        futures::stream::unfold(self, |mut run| async move {
            let chunk = run.next_chunk().await?;
            Some((chunk, run))
        })
    }

    fn abort(&mut self, err: WeatherError) -> WeatherError {
        self.tasks.abort_all();
        self.failed = true;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuxiliaryObservation, PrimaryObservation, Visibility};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Primary source answering from a table; unknown names are not found
    #[derive(Default)]
    struct TablePrimary {
        temperatures: HashMap<String, f64>,
        delays_ms: HashMap<String, u64>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        completed: AtomicUsize,
    }

    impl TablePrimary {
        fn with(entries: &[(&str, f64, u64)]) -> Self {
            Self {
                temperatures: entries.iter().map(|(l, t, _)| (l.to_string(), *t)).collect(),
                delays_ms: entries.iter().map(|(l, _, d)| (l.to_string(), *d)).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PrimarySource for TablePrimary {
        async fn fetch(&self, location: &str) -> Result<PrimaryObservation> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays_ms.get(location).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);

            let temperature = *self.temperatures.get(location).ok_or_else(|| {
                WeatherError::LocationNotFound {
                    location: location.to_string(),
                }
            })?;

            Ok(PrimaryObservation {
                location: location.to_string(),
                temperature,
                humidity: 50,
                pressure: 1010,
                wind_speed: 2.5,
            })
        }
    }

    struct FixedAuxiliary(Option<&'static str>);

    #[async_trait]
    impl AuxiliarySource for FixedAuxiliary {
        async fn fetch(&self, location: &str) -> Result<AuxiliaryObservation> {
            let visibility = Visibility::from(self.0.map(str::to_string));
            Ok(AuxiliaryObservation::new(location, visibility))
        }
    }

    struct OfflineAuxiliary;

    #[async_trait]
    impl AuxiliarySource for OfflineAuxiliary {
        async fn fetch(&self, location: &str) -> Result<AuxiliaryObservation> {
            Err(WeatherError::upstream("timeanddate.com", location, "connection refused"))
        }
    }

    fn pipeline(primary: Arc<TablePrimary>, max_concurrency: usize, chunk_size: usize) -> FetchPipeline {
        FetchPipeline::new(
            primary,
            Arc::new(FixedAuxiliary(Some("10"))),
            &PipelineConfig {
                max_concurrency,
                chunk_size,
            },
        )
        .unwrap()
    }

    fn names(locations: &[&str]) -> Vec<String> {
        locations.iter().map(|l| l.to_string()).collect()
    }

    #[tokio::test]
    async fn test_output_preserves_input_order() {
        // later locations finish first
        let primary = Arc::new(TablePrimary::with(&[
            ("A", 1.0, 60),
            ("B", 2.0, 40),
            ("C", 3.0, 20),
            ("D", 4.0, 0),
        ]));
        let batch = pipeline(primary, 4, 2)
            .fetch_batch(&names(&["A", "B", "C", "D"]))
            .await
            .unwrap();

        let locations: Vec<&str> = batch.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(locations, vec!["A", "B", "C", "D"]);
        let temperatures: Vec<f64> = batch.iter().map(|r| r.temperature).collect();
        assert_eq!(temperatures, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_chunks_are_released_in_windows() {
        let primary = Arc::new(TablePrimary::with(&[
            ("A", 1.0, 0),
            ("B", 2.0, 0),
            ("C", 3.0, 0),
            ("D", 4.0, 0),
            ("E", 5.0, 0),
        ]));
        let mut run = pipeline(primary, 2, 2)
            .run(names(&["A", "B", "C", "D", "E"]), 2)
            .unwrap();
        assert_eq!(run.len(), 5);

        let mut sizes = Vec::new();
        while let Some(chunk) = run.next_chunk().await {
            sizes.push(chunk.unwrap().len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(run.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let entries: Vec<(String, f64, u64)> =
            (0..12).map(|i| (format!("L{i}"), f64::from(i), 20)).collect();
        let borrowed: Vec<(&str, f64, u64)> =
            entries.iter().map(|(l, t, d)| (l.as_str(), *t, *d)).collect();
        let primary = Arc::new(TablePrimary::with(&borrowed));

        let locations: Vec<String> = entries.iter().map(|(l, _, _)| l.clone()).collect();
        let batch = pipeline(Arc::clone(&primary), 3, 12)
            .fetch_batch(&locations)
            .await
            .unwrap();

        assert_eq!(batch.len(), 12);
        assert!(primary.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failure_aborts_whole_batch() {
        let primary = Arc::new(TablePrimary::with(&[("Paris", 20.0, 0), ("Tokyo", 25.0, 50)]));
        let result = pipeline(primary, 4, 2)
            .fetch_batch(&names(&["Paris", "Nowhereville", "Tokyo"]))
            .await;

        assert!(matches!(
            result,
            Err(WeatherError::LocationNotFound { ref location }) if location == "Nowhereville"
        ));
    }

    #[tokio::test]
    async fn test_failure_cancels_in_flight_fetches() {
        let primary = Arc::new(TablePrimary::with(&[
            ("A", 1.0, 200),
            ("B", 2.0, 200),
            ("C", 3.0, 200),
        ]));
        let result = pipeline(Arc::clone(&primary), 4, 2)
            .fetch_batch(&names(&["A", "B", "Bad", "C"]))
            .await;
        assert!(matches!(result, Err(WeatherError::LocationNotFound { .. })));

        // only the failing lookup ran to completion
        let completed_at_failure = primary.completed.load(Ordering::SeqCst);
        assert_eq!(completed_at_failure, 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(primary.completed.load(Ordering::SeqCst), completed_at_failure);
    }

    #[tokio::test]
    async fn test_auxiliary_outage_fails_batch() {
        let pipeline = FetchPipeline::new(
            Arc::new(TablePrimary::with(&[("Paris", 20.0, 0), ("Tokyo", 25.0, 0)])),
            Arc::new(OfflineAuxiliary),
            &PipelineConfig::default(),
        )
        .unwrap();

        let result = pipeline.fetch_batch(&names(&["Paris", "Tokyo"])).await;
        assert!(matches!(
            result,
            Err(WeatherError::UpstreamUnavailable { source_name: "timeanddate.com", .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_stops_after_failure() {
        let primary = Arc::new(TablePrimary::with(&[("Paris", 20.0, 0)]));
        let chunks: Vec<Result<Vec<WeatherRecord>>> = pipeline(primary, 2, 1)
            .run(names(&["Paris", "Nowhereville"]), 1)
            .unwrap()
            .into_stream()
            .collect()
            .await;

        // Paris may or may not be released before the failure is observed,
        // but the stream always ends with exactly one error
        assert!(chunks.last().unwrap().is_err());
        assert_eq!(chunks.iter().filter(|c| c.is_err()).count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_visibility_is_not_an_error() {
        let pipeline = FetchPipeline::new(
            Arc::new(TablePrimary::with(&[("Oslo", -3.0, 0)])),
            Arc::new(FixedAuxiliary(None)),
            &PipelineConfig::default(),
        )
        .unwrap();

        let batch = pipeline.fetch_batch(&names(&["Oslo"])).await.unwrap();
        assert_eq!(batch[0].visibility.as_str(), "N/A");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let primary = Arc::new(TablePrimary::default());
        let batch = pipeline(primary, 2, 2).fetch_batch(&[]).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_rejected() {
        let primary = Arc::new(TablePrimary::default());
        let result = pipeline(primary, 2, 2).run(names(&["Paris"]), 0);
        assert!(matches!(result, Err(WeatherError::Validation { .. })));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result = FetchPipeline::new(
            Arc::new(TablePrimary::default()),
            Arc::new(FixedAuxiliary(None)),
            &PipelineConfig {
                max_concurrency: 0,
                chunk_size: 1,
            },
        );
        assert!(matches!(result, Err(WeatherError::Validation { .. })));
    }
}

//! Append-only CSV sink

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task;
use tracing::{debug, info};

use super::{Sink, SinkSummary};
use crate::Result;
use crate::error::WeatherError;
use crate::models::WeatherRecord;

pub const CSV_HEADER: [&str; 6] = [
    "Location",
    "Temperature",
    "Humidity",
    "Pressure",
    "Wind Speed",
    "Visibility",
];

/// Appends each batch to a CSV file, writing the header into a new or empty file.
///
/// Assumes it is the only writer of the file.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the file, failing if it does not exist
    pub async fn clear(&self) -> Result<()> {
        let path = self.path.clone();
        task::spawn_blocking(move || truncate(&path)).await??;
        info!("Cleared CSV file {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write(&self, batch: &[WeatherRecord]) -> Result<SinkSummary> {
        let rows: Vec<[String; 6]> = batch.iter().map(to_row).collect();
        let path = self.path.clone();

        let written = task::spawn_blocking(move || append_rows(&path, &rows)).await??;
        debug!("Appended {} rows to {}", written, self.path.display());

        Ok(SinkSummary::written(written))
    }
}

fn to_row(record: &WeatherRecord) -> [String; 6] {
    [
        record.location.clone(),
        format_float(record.temperature),
        record.humidity.to_string(),
        record.pressure.to_string(),
        format_float(record.wind_speed),
        record.visibility.as_str().to_string(),
    ]
}

/// `68` is written as `68.0`, `3.6` as-is
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn append_rows(path: &Path, rows: &[[String; 6]]) -> Result<usize> {
    let needs_header = std::fs::metadata(path).map_or(true, |metadata| metadata.len() == 0);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer.write_record(CSV_HEADER)?;
    }
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    Ok(rows.len())
}

fn truncate(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(WeatherError::validation(format!(
            "CSV file {} does not exist",
            path.display()
        )));
    }
    OpenOptions::new().write(true).truncate(true).open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TemperatureUnit, Visibility};

    fn record(location: &str, temperature: f64, visibility: Visibility) -> WeatherRecord {
        WeatherRecord {
            location: location.to_string(),
            temperature,
            unit: TemperatureUnit::Fahrenheit,
            humidity: 60,
            pressure: 1015,
            wind_speed: 3.6,
            visibility,
        }
    }

    #[tokio::test]
    async fn test_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("weather.csv"));

        let summary = sink
            .write(&[
                record("Paris", 68.0, Visibility::Reported("10".to_string())),
                record("Tokyo", 77.0, Visibility::Unavailable),
            ])
            .await
            .unwrap();
        assert_eq!(summary.written, 2);

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(
            contents,
            "Location,Temperature,Humidity,Pressure,Wind Speed,Visibility\n\
             Paris,68.0,60,1015,3.6,10\n\
             Tokyo,77.0,60,1015,3.6,N/A\n"
        );
    }

    #[tokio::test]
    async fn test_appends_without_repeating_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("weather.csv"));

        sink.write(&[record("Paris", 68.0, Visibility::Unavailable)])
            .await
            .unwrap();
        sink.write(&[record("Tokyo", 77.5, Visibility::Unavailable)])
            .await
            .unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[2], "Tokyo,77.5,60,1015,3.6,N/A");
    }

    #[tokio::test]
    async fn test_location_with_comma_is_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("weather.csv"));

        sink.write(&[record("Portland, OR", 50.0, Visibility::Unavailable)])
            .await
            .unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert!(contents.contains("\"Portland, OR\",50.0"));
    }

    #[tokio::test]
    async fn test_clear_truncates_and_header_returns() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("weather.csv"));

        sink.write(&[record("Paris", 68.0, Visibility::Unavailable)])
            .await
            .unwrap();
        sink.clear().await.unwrap();
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "");

        sink.write(&[record("Oslo", 26.6, Visibility::Unavailable)])
            .await
            .unwrap();
        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert!(contents.starts_with("Location,Temperature"));
    }

    #[tokio::test]
    async fn test_clear_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("missing.csv"));
        assert!(matches!(
            sink.clear().await,
            Err(WeatherError::Validation { .. })
        ));
    }
}

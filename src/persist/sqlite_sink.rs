//! Relational sink backed by a local SQLite file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{Connection, params};
use tokio::task;
use tracing::{debug, info};

use super::{Sink, SinkSummary};
use crate::Result;
use crate::models::WeatherRecord;

pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS weather_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location TEXT NOT NULL,
    temperature REAL NOT NULL,
    humidity INTEGER NOT NULL,
    pressure INTEGER NOT NULL,
    wind_speed REAL NOT NULL,
    visibility TEXT NOT NULL
)";

const INSERT_ROW: &str = "INSERT INTO weather_data
    (location, temperature, humidity, pressure, wind_speed, visibility)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// A row as stored in `weather_data`
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: i64,
    pub location: String,
    pub temperature: f64,
    pub humidity: i64,
    pub pressure: i64,
    pub wind_speed: f64,
    pub visibility: String,
}

/// Inserts each batch into `weather_data` in one transaction.
///
/// A connection is opened per call and closed when the call returns. The
/// table is never created implicitly; writing before [`SqliteSink::create_table`]
/// fails this sink.
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn create_table(&self) -> Result<()> {
        let path = self.path.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(path)?;
            conn.execute_batch(CREATE_TABLE)?;
            Ok(())
        })
        .await??;

        info!("weather_data table ready in {}", self.path.display());
        Ok(())
    }

    /// All stored rows in insertion order
    pub async fn rows(&self) -> Result<Vec<StoredRow>> {
        let path = self.path.clone();
        task::spawn_blocking(move || select_rows(&path)).await?
    }

    /// Delete every row, returning how many were removed
    pub async fn clear(&self) -> Result<usize> {
        let path = self.path.clone();
        let deleted = task::spawn_blocking(move || -> Result<usize> {
            let conn = Connection::open(path)?;
            Ok(conn.execute("DELETE FROM weather_data", [])?)
        })
        .await??;

        info!("Deleted {} rows from weather_data", deleted);
        Ok(deleted)
    }
}

#[async_trait]
impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write(&self, batch: &[WeatherRecord]) -> Result<SinkSummary> {
        let path = self.path.clone();
        let records = batch.to_vec();

        let written = task::spawn_blocking(move || insert_rows(&path, &records)).await??;
        debug!("Inserted {} rows into {}", written, self.path.display());

        Ok(SinkSummary::written(written))
    }
}

fn insert_rows(path: &Path, records: &[WeatherRecord]) -> Result<usize> {
    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;
    {
        let mut statement = tx.prepare(INSERT_ROW)?;
        for record in records {
            statement.execute(params![
                record.location,
                record.temperature,
                record.humidity,
                record.pressure,
                record.wind_speed,
                record.visibility.as_str(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

fn select_rows(path: &Path) -> Result<Vec<StoredRow>> {
    let conn = Connection::open(path)?;
    let mut statement = conn.prepare(
        "SELECT id, location, temperature, humidity, pressure, wind_speed, visibility
         FROM weather_data ORDER BY id",
    )?;

    let rows = statement
        .query_map([], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                location: row.get(1)?,
                temperature: row.get(2)?,
                humidity: row.get(3)?,
                pressure: row.get(4)?,
                wind_speed: row.get(5)?,
                visibility: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

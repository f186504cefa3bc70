//! Upstream data sources
//!
//! - Primary: numeric weather fields from a JSON API
//! - Auxiliary: visibility scraped from an HTML forecast page
//! - Geocoding: place name to coordinates, used by the map sink
//!
//! Each source sits behind a trait so the pipeline and sinks can be driven by
//! in-process fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::Result;
use crate::error::WeatherError;
use crate::models::{AuxiliaryObservation, PrimaryObservation};

pub mod geocoding;
pub mod open_weather;
pub mod time_and_date;

pub use geocoding::OpenMeteoGeocoder;
pub use open_weather::OpenWeatherClient;
pub use time_and_date::TimeAndDateClient;

const USER_AGENT: &str = concat!("weather-fanout/", env!("CARGO_PKG_VERSION"));

/// Source of the numeric weather fields for a location
#[async_trait]
pub trait PrimarySource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<PrimaryObservation>;
}

/// Source of the supplementary visibility field for a location.
///
/// Implementations fall back to `Visibility::Unavailable` instead of failing
/// when the value cannot be found; only transport failures are errors.
#[async_trait]
pub trait AuxiliarySource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<AuxiliaryObservation>;
}

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Resolves a place name to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Fails with `GeocodeNotFound` when the place is unknown
    async fn locate(&self, location: &str) -> Result<Coordinates>;
}

/// Shared HTTP client construction for all sources
pub(crate) fn http_client(timeout_seconds: u32) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.into()))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| WeatherError::config(format!("Failed to create HTTP client: {e}")))
}

pub(crate) fn ensure_location(location: &str) -> Result<()> {
    if location.is_empty() {
        return Err(WeatherError::validation("Location cannot be empty"));
    }
    Ok(())
}

//! Place-name geocoding via the OpenMeteo geocoding API (no API key required)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{Coordinates, Geocoder, ensure_location, http_client};
use crate::Result;
use crate::config::GeocodingConfig;
use crate::error::WeatherError;

const SOURCE_NAME: &str = "OpenMeteo geocoding";

pub struct OpenMeteoGeocoder {
    client: Client,
    base_url: String,
}

impl OpenMeteoGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, location: &str) -> String {
        format!(
            "{}/search?name={}&count=1&language=en&format=json",
            self.base_url,
            urlencoding::encode(location)
        )
    }
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    #[instrument(name = "geocode", skip(self))]
    async fn locate(&self, location: &str) -> Result<Coordinates> {
        ensure_location(location)?;

        let response = self
            .client
            .get(self.search_url(location))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| WeatherError::upstream(SOURCE_NAME, location, e.without_url().to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::upstream(SOURCE_NAME, location, e.without_url().to_string()))?;

        parse_search_response(location, &body)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
}

/// Take the best (first) match of a search response
pub fn parse_search_response(location: &str, body: &str) -> Result<Coordinates> {
    let response: GeocodingResponse = serde_json::from_str(body)
        .map_err(|e| WeatherError::malformed(SOURCE_NAME, location, format!("invalid JSON: {e}")))?;

    let Some(best) = response.results.unwrap_or_default().into_iter().next() else {
        warn!("No geocoding results found for '{}'", location);
        return Err(WeatherError::GeocodeNotFound {
            location: location.to_string(),
        });
    };

    debug!(
        "Found location: {} ({}) at ({:.4}, {:.4})",
        best.name,
        best.country.as_deref().unwrap_or("Unknown"),
        best.latitude,
        best.longitude
    );

    Ok(Coordinates {
        latitude: best.latitude,
        longitude: best.longitude,
    })
}

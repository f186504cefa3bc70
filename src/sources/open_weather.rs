//! Primary source: OpenWeatherMap current-weather-by-name API

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{PrimarySource, ensure_location, http_client};
use crate::Result;
use crate::config::PrimaryConfig;
use crate::error::WeatherError;
use crate::models::PrimaryObservation;

const SOURCE_NAME: &str = "OpenWeatherMap";

/// Client for `GET {base_url}/weather?q=<location>&appid=<key>&units=metric`
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// Create a client; fails if no API key is configured
    pub fn new(config: &PrimaryConfig) -> Result<Self> {
        let api_key = config.api_key()?.to_string();
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request_url(&self, location: &str) -> String {
        format!(
            "{}/weather?q={}&appid={}&units=metric",
            self.base_url,
            urlencoding::encode(location),
            self.api_key
        )
    }
}

#[async_trait]
impl PrimarySource for OpenWeatherClient {
    #[instrument(name = "primary_fetch", skip(self))]
    async fn fetch(&self, location: &str) -> Result<PrimaryObservation> {
        ensure_location(location)?;
        let start_time = Instant::now();

        let response = self
            .client
            .get(self.request_url(location))
            .send()
            .await
            .map_err(|e| WeatherError::upstream(SOURCE_NAME, location, e.without_url().to_string()))?;

        let status = response.status();
        debug!("HTTP response received: {}", status);

        if status == StatusCode::NOT_FOUND {
            warn!("Location not found (HTTP 404)");
            return Err(WeatherError::LocationNotFound {
                location: location.to_string(),
            });
        }

        if !status.is_success() {
            return Err(WeatherError::upstream(
                SOURCE_NAME,
                location,
                format!(
                    "request failed with status: {} - {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown error")
                ),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::upstream(SOURCE_NAME, location, e.without_url().to_string()))?;

        let observation = parse_current_weather(location, &body)?;

        info!(
            "Fetched primary observation in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(observation)
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    name: Option<String>,
    main: Option<MainSection>,
    wind: Option<WindSection>,
    cod: Option<Value>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainSection {
    temp: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WindSection {
    speed: Option<f64>,
}

/// OpenWeatherMap reports `cod` as a number on success and a string on errors
fn is_not_found(cod: &Value) -> bool {
    match cod {
        Value::String(code) => code == "404",
        Value::Number(code) => code.as_u64() == Some(404),
        _ => false,
    }
}

/// Parse a current-weather JSON body into an observation for `location`
pub fn parse_current_weather(location: &str, body: &str) -> Result<PrimaryObservation> {
    let response: CurrentWeatherResponse = serde_json::from_str(body)
        .map_err(|e| WeatherError::malformed(SOURCE_NAME, location, format!("invalid JSON: {e}")))?;

    if response.cod.as_ref().is_some_and(is_not_found) {
        debug!(
            "Upstream reports no match: {}",
            response.message.as_deref().unwrap_or("city not found")
        );
        return Err(WeatherError::LocationNotFound {
            location: location.to_string(),
        });
    }

    let missing = |field: &str| WeatherError::malformed(SOURCE_NAME, location, format!("missing {field}"));

    let main = response.main.ok_or_else(|| missing("main"))?;
    let temperature = main.temp.ok_or_else(|| missing("main.temp"))?;
    let humidity = main.humidity.ok_or_else(|| missing("main.humidity"))?;
    let pressure = main.pressure.ok_or_else(|| missing("main.pressure"))?;
    let wind_speed = response
        .wind
        .and_then(|wind| wind.speed)
        .ok_or_else(|| missing("wind.speed"))?;

    if let Some(name) = &response.name {
        debug!("Upstream resolved '{}' to '{}'", location, name);
    }

    Ok(PrimaryObservation {
        location: location.to_string(),
        temperature,
        humidity: humidity.round() as i64,
        pressure: pressure.round() as i64,
        wind_speed,
    })
}

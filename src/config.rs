//! Configuration management for the weather fan-out pipeline
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeatherError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure, passed explicitly to the pipeline and sinks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Primary (numeric) weather API
    pub primary: PrimaryConfig,
    /// Auxiliary (scraped) weather page
    pub auxiliary: AuxiliaryConfig,
    /// Geocoding API used for the map
    pub geocoding: GeocodingConfig,
    /// Worker pool and release granularity
    pub pipeline: PipelineConfig,
    /// Sink destinations
    pub output: OutputConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Primary weather API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Upstream API key (`appid`)
    pub api_key: Option<String>,
    /// Base URL, without the trailing `/weather`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

/// Auxiliary weather page settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxiliaryConfig {
    /// Base URL; the location and `/ext` are appended
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

/// Geocoding API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Base URL, without the trailing `/search`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

/// Fetch pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of locations fetched at the same time
    pub max_concurrency: usize,
    /// Number of completed records released to the consumer at a time
    pub chunk_size: usize,
}

/// Sink destinations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Append-only CSV file
    pub csv_path: PathBuf,
    /// SQLite database holding the `weather_data` table
    pub database_path: PathBuf,
    /// HTML map document, overwritten on every run
    pub map_path: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

// Default value functions
fn default_primary_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_auxiliary_base_url() -> String {
    "https://www.timeanddate.com/weather".to_string()
}

fn default_geocoding_base_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_max_concurrency() -> usize {
    8
}

fn default_chunk_size() -> usize {
    2
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("weather_data.csv")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("weather_data.db")
}

fn default_map_path() -> PathBuf {
    PathBuf::from("weather_data_map.html")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_primary_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for AuxiliaryConfig {
    fn default() -> Self {
        Self {
            base_url: default_auxiliary_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            database_path: default_database_path(),
            map_path: default_map_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl PrimaryConfig {
    /// The configured API key, required before any primary fetch
    pub fn api_key(&self) -> std::result::Result<&str, WeatherError> {
        self.api_key.as_deref().ok_or_else(|| {
            WeatherError::config(
                "Primary weather API key is missing. Set primary.api_key or WEATHER_FANOUT_PRIMARY__API_KEY.",
            )
        })
    }
}

impl FetcherConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. WEATHER_FANOUT_PRIMARY__API_KEY
        builder = builder.add_source(
            Environment::with_prefix("WEATHER_FANOUT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: FetcherConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weather-fanout").join("config.toml"))
    }

    /// Apply default values to empty or zeroed configuration fields
    pub fn apply_defaults(&mut self) {
        if self.primary.base_url.is_empty() {
            self.primary.base_url = default_primary_base_url();
        }
        if self.primary.timeout_seconds == 0 {
            self.primary.timeout_seconds = default_timeout();
        }
        if self.auxiliary.base_url.is_empty() {
            self.auxiliary.base_url = default_auxiliary_base_url();
        }
        if self.auxiliary.timeout_seconds == 0 {
            self.auxiliary.timeout_seconds = default_timeout();
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_geocoding_base_url();
        }
        if self.geocoding.timeout_seconds == 0 {
            self.geocoding.timeout_seconds = default_timeout();
        }
        if self.pipeline.max_concurrency == 0 {
            self.pipeline.max_concurrency = default_max_concurrency();
        }
        if self.pipeline.chunk_size == 0 {
            self.pipeline.chunk_size = default_chunk_size();
        }
        if self.output.csv_path.as_os_str().is_empty() {
            self.output.csv_path = default_csv_path();
        }
        if self.output.database_path.as_os_str().is_empty() {
            self.output.database_path = default_database_path();
        }
        if self.output.map_path.as_os_str().is_empty() {
            self.output.map_path = default_map_path();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_key()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the API key if one is configured
    pub fn validate_api_key(&self) -> Result<()> {
        if let Some(api_key) = &self.primary.api_key {
            if api_key.is_empty() {
                return Err(WeatherError::config(
                    "Weather API key cannot be empty if provided. Either remove it or provide a valid key."
                ).into());
            }

            if api_key.len() < 8 {
                return Err(WeatherError::config(
                    "Weather API key appears to be invalid (too short). Please check your API key."
                ).into());
            }

            if api_key.len() > 100 {
                return Err(WeatherError::config(
                    "Weather API key appears to be invalid (too long). Please check your API key."
                ).into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        for (name, timeout) in [
            ("Primary", self.primary.timeout_seconds),
            ("Auxiliary", self.auxiliary.timeout_seconds),
            ("Geocoding", self.geocoding.timeout_seconds),
        ] {
            if timeout > 300 {
                return Err(WeatherError::config(format!(
                    "{name} timeout cannot exceed 300 seconds"
                ))
                .into());
            }
        }

        if self.pipeline.max_concurrency == 0 || self.pipeline.max_concurrency > 64 {
            return Err(WeatherError::config(
                "Pipeline max concurrency must be between 1 and 64"
            ).into());
        }

        if self.pipeline.chunk_size == 0 {
            return Err(WeatherError::config(
                "Pipeline chunk size must be at least 1"
            ).into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherError::config(
                format!("Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_log_levels.join(", ")
                )
            ).into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherError::config(
                format!("Invalid log format '{}'. Must be one of: {}",
                    self.logging.format,
                    valid_log_formats.join(", ")
                )
            ).into());
        }

        for (name, url) in [
            ("Primary", &self.primary.base_url),
            ("Auxiliary", &self.auxiliary.base_url),
            ("Geocoding", &self.geocoding.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WeatherError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

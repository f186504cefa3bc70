//! Error types and handling for the weather fan-out pipeline

use thiserror::Error;

/// Main error type for fetching, merging and persisting weather records
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Transport-level failure talking to an upstream (network, DNS, timeout, 5xx)
    #[error("{source_name} unavailable for '{location}': {message}")]
    UpstreamUnavailable {
        source_name: &'static str,
        location: String,
        message: String,
    },

    /// The upstream answered, but without the fields we need
    #[error("Malformed response from {source_name} for '{location}': {message}")]
    MalformedResponse {
        source_name: &'static str,
        location: String,
        message: String,
    },

    /// The primary source reports no match for the location
    #[error("Location not found: {location}")]
    LocationNotFound { location: String },

    /// The geocoder has no coordinates for the location
    #[error("No coordinates found for '{location}'")]
    GeocodeNotFound { location: String },

    /// Primary and auxiliary observations describe different locations
    #[error("Cannot merge observations for '{primary}' and '{auxiliary}'")]
    MergeKeyMismatch { primary: String, auxiliary: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// CSV encoding errors
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    /// SQLite errors
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// A worker task panicked or was cancelled
    #[error("Background task failed: {source}")]
    TaskJoin {
        #[from]
        source: tokio::task::JoinError,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl WeatherError {
    /// Create a new upstream-unavailable error
    pub fn upstream<L: Into<String>, M: Into<String>>(
        source_name: &'static str,
        location: L,
        message: M,
    ) -> Self {
        Self::UpstreamUnavailable {
            source_name,
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a new malformed-response error
    pub fn malformed<L: Into<String>, M: Into<String>>(
        source_name: &'static str,
        location: L,
        message: M,
    ) -> Self {
        Self::MalformedResponse {
            source_name,
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// The location this error concerns, if it is tied to one
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::UpstreamUnavailable { location, .. }
            | Self::MalformedResponse { location, .. }
            | Self::LocationNotFound { location }
            | Self::GeocodeNotFound { location } => Some(location),
            Self::MergeKeyMismatch { primary, .. } => Some(primary),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WeatherError::UpstreamUnavailable {
                source_name,
                location,
                ..
            } => format!(
                "Unable to reach {source_name} for '{location}'. Please check your internet connection."
            ),
            WeatherError::MalformedResponse {
                source_name,
                location,
                ..
            } => format!("{source_name} returned unexpected data for '{location}'."),
            WeatherError::LocationNotFound { location } => {
                format!("Location not found: {location}")
            }
            WeatherError::GeocodeNotFound { location } => {
                format!("Could not place '{location}' on the map.")
            }
            WeatherError::Validation { message } => format!("Invalid input: {message}"),
            WeatherError::Config { .. } => {
                "Configuration error. Please check your config file and API key.".to_string()
            }
            WeatherError::Io { .. } | WeatherError::Csv { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            WeatherError::Sqlite { .. } => {
                "Database operation failed. Run `init-db` if the table does not exist yet."
                    .to_string()
            }
            WeatherError::MergeKeyMismatch { .. }
            | WeatherError::TaskJoin { .. }
            | WeatherError::General { .. } => self.to_string(),
        }
    }
}

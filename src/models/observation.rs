//! Partial observations returned by the primary and auxiliary sources

use std::fmt;

/// Rendered in place of a visibility value the auxiliary source could not provide
pub const VISIBILITY_UNAVAILABLE: &str = "N/A";

/// Numeric weather fields for one location from the primary source
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryObservation {
    /// Location exactly as requested by the caller
    pub location: String,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: i64,
    /// Atmospheric pressure in hPa
    pub pressure: i64,
    /// Wind speed in m/s
    pub wind_speed: f64,
}

/// Visibility as scraped from the auxiliary source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Visibility {
    /// The value found on the page, verbatim
    Reported(String),
    /// Nothing usable was found
    #[default]
    Unavailable,
}

impl Visibility {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Visibility::Reported(value) => value,
            Visibility::Unavailable => VISIBILITY_UNAVAILABLE,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Visibility::Reported(_))
    }
}

impl From<Option<String>> for Visibility {
    fn from(value: Option<String>) -> Self {
        value.map_or(Visibility::Unavailable, Visibility::Reported)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Supplementary fields for one location from the auxiliary source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryObservation {
    /// Location the page was fetched for
    pub location: String,
    pub visibility: Visibility,
}

impl AuxiliaryObservation {
    #[must_use]
    pub fn new(location: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            location: location.into(),
            visibility,
        }
    }

    /// Observation carrying the "N/A" fallback
    #[must_use]
    pub fn unavailable(location: impl Into<String>) -> Self {
        Self::new(location, Visibility::Unavailable)
    }
}

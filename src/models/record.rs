//! Merged weather record, temperature unit and batch rendering

use std::fmt;
use std::str::FromStr;

use super::observation::Visibility;
use crate::error::WeatherError;

/// Temperature scale a record's `temperature` is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => f.write_str("Celsius"),
            TemperatureUnit::Fahrenheit => f.write_str("Fahrenheit"),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(WeatherError::validation(format!(
                "Unknown temperature unit '{other}'. Must be one of: celsius, fahrenheit"
            ))),
        }
    }
}

/// One location's merged observation
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub location: String,
    pub temperature: f64,
    /// Scale of `temperature`
    pub unit: TemperatureUnit,
    /// Relative humidity in percent
    pub humidity: i64,
    /// Atmospheric pressure in hPa
    pub pressure: i64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    pub visibility: Visibility,
}

impl WeatherRecord {
    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}{}", self.temperature, self.unit.symbol())
    }
}

/// Ordered records from one pipeline invocation, one per requested location
pub type Batch = Vec<WeatherRecord>;

/// Render records as a fixed-width text table
#[must_use]
pub fn format_table(records: &[WeatherRecord]) -> String {
    let header = format!(
        "{:<15} {:<15} {:<10} {:<10} {:<12} {:<10}",
        "Location", "Temperature", "Humidity", "Pressure", "Wind Speed", "Visibility"
    );
    let mut table = String::new();
    table.push_str(&header);
    table.push('\n');
    table.push_str(&"-".repeat(header.len()));
    table.push('\n');

    for record in records {
        let row = format!(
            "{:<15} {:<15.1} {:<10} {:<10} {:<12} {:<10}",
            record.location,
            record.temperature,
            record.humidity,
            record.pressure,
            record.wind_speed,
            record.visibility
        );
        table.push_str(row.trim_end());
        table.push('\n');
    }

    table
}

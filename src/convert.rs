//! Temperature unit conversion for batches of records

use crate::models::{Batch, TemperatureUnit, WeatherRecord};

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Express one record's temperature in `target`, leaving the input untouched.
///
/// Records already in `target` are copied as-is, so converting twice is harmless.
#[must_use]
pub fn convert_record(record: &WeatherRecord, target: TemperatureUnit) -> WeatherRecord {
    let temperature = match (record.unit, target) {
        (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => {
            celsius_to_fahrenheit(record.temperature)
        }
        (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => {
            fahrenheit_to_celsius(record.temperature)
        }
        _ => record.temperature,
    };

    WeatherRecord {
        temperature,
        unit: target,
        ..record.clone()
    }
}

/// Produce a new batch with every temperature expressed in `target`
#[must_use]
pub fn convert(batch: &[WeatherRecord], target: TemperatureUnit) -> Batch {
    batch
        .iter()
        .map(|record| convert_record(record, target))
        .collect()
}

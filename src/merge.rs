//! Combines the two partial observations of a location into one record

use crate::error::WeatherError;
use crate::models::{AuxiliaryObservation, PrimaryObservation, TemperatureUnit, WeatherRecord};

/// Merge a primary and an auxiliary observation of the same location.
///
/// Primary observations are always in Celsius, so the merged record is too.
pub fn merge(
    primary: PrimaryObservation,
    auxiliary: AuxiliaryObservation,
) -> Result<WeatherRecord, WeatherError> {
    if primary.location != auxiliary.location {
        return Err(WeatherError::MergeKeyMismatch {
            primary: primary.location,
            auxiliary: auxiliary.location,
        });
    }

    Ok(WeatherRecord {
        location: primary.location,
        temperature: primary.temperature,
        unit: TemperatureUnit::Celsius,
        humidity: primary.humidity,
        pressure: primary.pressure,
        wind_speed: primary.wind_speed,
        visibility: auxiliary.visibility,
    })
}

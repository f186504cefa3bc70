//! In-process fake sources for driving the pipeline without a network

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use weather_fanout::{
    AuxiliaryObservation, AuxiliarySource, Coordinates, Geocoder, PrimaryObservation,
    PrimarySource, Result, Visibility, WeatherError,
};

/// Canned primary readings keyed by location
#[derive(Default)]
pub struct FakePrimary {
    readings: HashMap<String, (f64, u64)>,
    pub calls: AtomicUsize,
}

impl FakePrimary {
    /// `(location, celsius, delay_ms)`
    pub fn new(readings: &[(&str, f64, u64)]) -> Arc<Self> {
        Arc::new(Self {
            readings: readings
                .iter()
                .map(|(location, temperature, delay)| (location.to_string(), (*temperature, *delay)))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PrimarySource for FakePrimary {
    async fn fetch(&self, location: &str) -> Result<PrimaryObservation> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(&(temperature, delay)) = self.readings.get(location) else {
            return Err(WeatherError::LocationNotFound {
                location: location.to_string(),
            });
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        Ok(PrimaryObservation {
            location: location.to_string(),
            temperature,
            humidity: 60,
            pressure: 1015,
            wind_speed: 3.6,
        })
    }
}

/// Visibility per location; anything unlisted is unavailable
#[derive(Default)]
pub struct FakeAuxiliary {
    visibility: HashMap<String, String>,
}

impl FakeAuxiliary {
    pub fn new(visibility: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            visibility: visibility
                .iter()
                .map(|(location, value)| (location.to_string(), value.to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl AuxiliarySource for FakeAuxiliary {
    async fn fetch(&self, location: &str) -> Result<AuxiliaryObservation> {
        let visibility = Visibility::from(self.visibility.get(location).cloned());
        Ok(AuxiliaryObservation::new(location, visibility))
    }
}

/// Geocoder that knows a handful of capitals
pub struct FakeGeocoder;

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn locate(&self, location: &str) -> Result<Coordinates> {
        let (latitude, longitude) = match location {
            "Paris" => (48.8534, 2.3488),
            "Tokyo" => (35.6895, 139.6917),
            "Oslo" => (59.9127, 10.7461),
            _ => {
                return Err(WeatherError::GeocodeNotFound {
                    location: location.to_string(),
                });
            }
        };
        Ok(Coordinates {
            latitude,
            longitude,
        })
    }
}

//! Data models for the weather fan-out pipeline
//!
//! - Observation: partial results from the primary and auxiliary sources
//! - Record: the merged, unit-tagged weather record and its batch

pub mod observation;
pub mod record;

// Re-export all public types for convenient access
pub use observation::{AuxiliaryObservation, PrimaryObservation, VISIBILITY_UNAVAILABLE, Visibility};
pub use record::{Batch, TemperatureUnit, WeatherRecord, format_table};

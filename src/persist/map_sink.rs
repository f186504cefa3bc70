//! Geographic map sink: one Leaflet marker per geocoded record

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task;
use tracing::{debug, warn};

use super::{Sink, SinkSummary};
use crate::Result;
use crate::error::WeatherError;
use crate::models::WeatherRecord;
use crate::sources::Geocoder;

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Weather data</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map("map").setView([0, 0], 2);
L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
    attribution: "&copy; OpenStreetMap contributors"
}).addTo(map);
var markers = __MARKERS__;
markers.forEach(function (m) {
    L.marker([m.latitude, m.longitude]).bindPopup(m.popup).addTo(map);
});
</script>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct Marker {
    latitude: f64,
    longitude: f64,
    popup: String,
}

/// Renders the batch as a self-contained HTML map, replacing any previous document
pub struct MapSink {
    path: PathBuf,
    geocoder: Arc<dyn Geocoder>,
}

impl MapSink {
    pub fn new(path: impl Into<PathBuf>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            path: path.into(),
            geocoder,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for MapSink {
    fn name(&self) -> &str {
        "map"
    }

    async fn write(&self, batch: &[WeatherRecord]) -> Result<SinkSummary> {
        let mut markers = Vec::with_capacity(batch.len());
        let mut skipped = Vec::new();

        for record in batch {
            match self.geocoder.locate(&record.location).await {
                Ok(coordinates) => markers.push(Marker {
                    latitude: coordinates.latitude,
                    longitude: coordinates.longitude,
                    popup: popup_html(record),
                }),
                Err(WeatherError::GeocodeNotFound { location }) => {
                    warn!("Skipping map marker for '{}': no coordinates", location);
                    skipped.push(location);
                }
                Err(e) => return Err(e),
            }
        }

        let document = render_document(&markers)?;
        let path = self.path.clone();
        task::spawn_blocking(move || std::fs::write(path, document)).await??;
        debug!("Wrote {} markers to {}", markers.len(), self.path.display());

        Ok(SinkSummary {
            written: markers.len(),
            skipped,
        })
    }
}

fn popup_html(record: &WeatherRecord) -> String {
    [
        format!("Location: {}", record.location),
        format!("Temperature: {}", record.format_temperature()),
        format!("Humidity: {}%", record.humidity),
        format!("Pressure: {} hPa", record.pressure),
        format!("Wind Speed: {} m/s", record.wind_speed),
        format!("Visibility: {}", record.visibility),
    ]
    .iter()
    .map(|line| escape_html(line))
    .collect::<Vec<_>>()
    .join("<br>")
}

fn render_document(markers: &[Marker]) -> Result<String> {
    let markers_json = serde_json::to_string(markers)
        .map_err(|e| WeatherError::general(format!("Failed to encode map markers: {e}")))?;
    Ok(MAP_TEMPLATE.replace("__MARKERS__", &markers_json))
}

/// Escape text for inclusion in HTML
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

//! Auxiliary source: visibility scraped from timeanddate.com's extended forecast page

use std::sync::LazyLock;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use super::{AuxiliarySource, ensure_location, http_client};
use crate::Result;
use crate::config::AuxiliaryConfig;
use crate::error::WeatherError;
use crate::models::{AuxiliaryObservation, Visibility};

const SOURCE_NAME: &str = "timeanddate.com";

static QUICK_FACTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#qfacts p").expect("quick facts selector is valid"));

/// Client for `GET {base_url}/<location>/ext`
pub struct TimeAndDateClient {
    client: Client,
    base_url: String,
}

impl TimeAndDateClient {
    pub fn new(config: &AuxiliaryConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The location is a path such as `uk/london` and keeps its slashes.
    /// `?` and `#` are escaped so they stay inside the path segment.
    fn page_url(&self, location: &str) -> String {
        let path = location.replace('?', "%3F").replace('#', "%23");
        format!("{}/{}/ext", self.base_url, path)
    }
}

#[async_trait]
impl AuxiliarySource for TimeAndDateClient {
    #[instrument(name = "auxiliary_fetch", skip(self))]
    async fn fetch(&self, location: &str) -> Result<AuxiliaryObservation> {
        ensure_location(location)?;

        let response = self
            .client
            .get(self.page_url(location))
            .send()
            .await
            .map_err(|e| WeatherError::upstream(SOURCE_NAME, location, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!("No forecast page (HTTP {}), visibility unavailable", status);
            return Ok(AuxiliaryObservation::unavailable(location));
        }

        let html = response
            .text()
            .await
            .map_err(|e| WeatherError::upstream(SOURCE_NAME, location, e.without_url().to_string()))?;

        let visibility = extract_visibility(&html);
        debug!("Visibility for '{}': {}", location, visibility);
        Ok(AuxiliaryObservation::new(location, visibility))
    }
}

/// Pull the visibility out of the page's quick-facts block.
///
/// The value is the second-to-last word of the block's last paragraph
/// ("Visibility: 16 km" yields "16"). Anything else yields `Unavailable`.
pub fn extract_visibility(html: &str) -> Visibility {
    let document = Html::parse_document(html);
    let last_paragraph = match document.select(&QUICK_FACTS).last() {
        Some(paragraph) => paragraph.text().collect::<String>(),
        None => return Visibility::Unavailable,
    };

    let tokens: Vec<&str> = last_paragraph.split_whitespace().collect();
    match tokens.len() {
        0 | 1 => Visibility::Unavailable,
        len => Visibility::Reported(tokens[len - 2].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_server;
    use rstest::rstest;

    fn page(facts: &str) -> String {
        format!(
            r#"<html><body>
                <div id="bk-focus"><p>Now: 20 °C</p></div>
                <div id="qfacts">{facts}</div>
            </body></html>"#
        )
    }

    #[rstest]
    #[case("<p>Pressure: 1015 mbar</p><p>Visibility: 16 km</p>", Visibility::Reported("16".to_string()))]
    #[case("<p>Visibility: <span>N/A</span> km</p>", Visibility::Reported("N/A".to_string()))]
    #[case("<p>Dew Point: 9 °C</p><p>Visibility: <b>10</b> km</p>", Visibility::Reported("10".to_string()))]
    #[case("<p>Visibility:<b>10</b> km</p>", Visibility::Reported("Visibility:10".to_string()))]
    #[case("<p>Visibility</p>", Visibility::Unavailable)]
    #[case("<p></p>", Visibility::Unavailable)]
    #[case("", Visibility::Unavailable)]
    fn test_extract_visibility(#[case] facts: &str, #[case] expected: Visibility) {
        assert_eq!(extract_visibility(&page(facts)), expected);
    }

    #[test]
    fn test_page_without_quick_facts() {
        let html = "<html><body><p>Visibility: 16 km</p></body></html>";
        assert_eq!(extract_visibility(html), Visibility::Unavailable);
    }

    #[test]
    fn test_page_url_passes_location_through() {
        let client = TimeAndDateClient::new(&AuxiliaryConfig::default()).unwrap();
        assert_eq!(
            client.page_url("uk/london"),
            "https://www.timeanddate.com/weather/uk/london/ext"
        );
    }

    #[test]
    fn test_page_url_keeps_query_characters_in_path() {
        let client = TimeAndDateClient::new(&AuxiliaryConfig::default()).unwrap();
        assert_eq!(
            client.page_url("what?city#1"),
            "https://www.timeanddate.com/weather/what%3Fcity%231/ext"
        );
    }

    fn client_for(base_url: &str) -> TimeAndDateClient {
        TimeAndDateClient::new(&AuxiliaryConfig {
            base_url: base_url.to_string(),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_error_page_yields_unavailable() {
        let base_url = test_server::respond_with("500 Internal Server Error", "boom");
        let observation = client_for(&base_url).fetch("uk/london").await.unwrap();
        assert_eq!(observation.location, "uk/london");
        assert_eq!(observation.visibility, Visibility::Unavailable);
    }

    #[tokio::test]
    async fn test_http_200_page_is_scraped() {
        let base_url = test_server::respond_with(
            "200 OK",
            r#"<html><body><div id="qfacts"><p>Visibility: 16 km</p></div></body></html>"#,
        );
        let observation = client_for(&base_url).fetch("uk/london").await.unwrap();
        assert_eq!(observation.visibility, Visibility::Reported("16".to_string()));
    }

    #[tokio::test]
    async fn test_connection_refused_is_upstream_unavailable() {
        let err = client_for(test_server::UNREACHABLE)
            .fetch("uk/london")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WeatherError::UpstreamUnavailable { source_name: "timeanddate.com", .. }
        ));
    }
}

//! World Air Quality Index (WAQI) client.
//!
//! WAQI publishes per-pollutant values as US EPA AQI sub-indices, which are
//! converted back to concentrations before classification.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::http::{ApiRequest, HttpBackend};
use super::{endpoint, AirQualitySource};
use crate::aqi::aqi_to_concentration;
use crate::error::{Error, Result};
use crate::reading::{Location, Pollutant, Reading, Source};

const PROVIDER: &str = "WAQI";

#[derive(Debug, Deserialize)]
struct FeedResponse {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    #[serde(default)]
    aqi: serde_json::Value,
    city: Option<CityDto>,
    /// Only `pm25` and `o3` are read; other entries may hold anything.
    #[serde(default)]
    iaqi: HashMap<String, serde_json::Value>,
    time: Option<TimeDto>,
}

#[derive(Debug, Deserialize)]
struct CityDto {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeDto {
    iso: Option<String>,
}

/// Measured PM2.5 and ozone from the WAQI feed API.
pub struct WaqiSource {
    backend: Arc<dyn HttpBackend>,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for WaqiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaqiSource")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl WaqiSource {
    /// Create a WAQI source.
    #[must_use]
    pub fn new(backend: Arc<dyn HttpBackend>, base_url: Url, token: impl Into<String>) -> Self {
        Self {
            backend,
            base_url,
            token: token.into(),
        }
    }

    fn feed_url(&self, location: &Location) -> Result<Url> {
        let station = match location {
            Location::Coordinates(c) => format!("geo:{};{}", c.latitude, c.longitude),
            Location::City(name) => name.to_lowercase(),
        };
        // The feed endpoint expects a trailing slash.
        let mut url = endpoint(&self.base_url, &["feed", &station, ""])?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }

    fn parse(body: &str, location: &Location) -> Result<Vec<Reading>> {
        let response: FeedResponse = serde_json::from_str(body)
            .map_err(|e| Error::invalid_response(PROVIDER, e.to_string()))?;

        if response.status != "ok" {
            let message = response.data.as_str().unwrap_or("unknown error");
            return match message.to_ascii_lowercase().as_str() {
                "invalid key" => Err(Error::Unauthorized { provider: PROVIDER }),
                m if m.contains("unknown station") => Err(Error::no_data(location)),
                _ => Err(Error::invalid_response(PROVIDER, message)),
            };
        }

        let data: FeedData = serde_json::from_value(response.data)
            .map_err(|e| Error::invalid_response(PROVIDER, e.to_string()))?;

        // "-" means the station currently has no data.
        if !data.aqi.is_number() {
            debug!("WAQI: station for {} reports no AQI", location);
            return Err(Error::no_data(location));
        }

        let observed = data
            .time
            .and_then(|t| t.iso)
            .ok_or_else(|| Error::invalid_response(PROVIDER, "missing time.iso"))?;
        let timestamp = DateTime::parse_from_rfc3339(&observed)
            .map_err(|e| Error::invalid_response(PROVIDER, format!("bad time '{observed}': {e}")))?
            .with_timezone(&Utc);

        let station = data
            .city
            .and_then(|c| c.name)
            .unwrap_or_else(|| location.to_string());
        let origin = format!("{PROVIDER} • {station}");

        let mut readings = Vec::new();
        for (key, pollutant) in [("pm25", Pollutant::Pm25), ("o3", Pollutant::Ozone)] {
            let Some(entry) = data.iaqi.get(key) else {
                continue;
            };
            let Some(sub_index) = entry.get("v").and_then(serde_json::Value::as_f64) else {
                debug!("WAQI: ignoring non-numeric {} sub-index {}", key, entry);
                continue;
            };
            let Some(concentration) = aqi_to_concentration(pollutant, sub_index) else {
                debug!("WAQI: ignoring {} sub-index {}", key, sub_index);
                continue;
            };
            readings.push(Reading::new(
                pollutant,
                concentration,
                timestamp,
                Source::Measured,
                origin.clone(),
            )?);
        }

        if readings.is_empty() {
            return Err(Error::no_data(location));
        }
        Ok(readings)
    }
}

#[async_trait]
impl AirQualitySource for WaqiSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, location: &Location) -> Result<Vec<Reading>> {
        let request = ApiRequest::new(PROVIDER, self.feed_url(location)?);
        let body = self.backend.get_text(&request).await?;
        let readings = Self::parse(&body, location)?;
        info!("WAQI: {} readings for {}", readings.len(), location);
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::http::testing::{Canned, FakeBackend};
    use serde_json::json;

    fn source(backend: FakeBackend) -> (WaqiSource, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let source = WaqiSource::new(
            backend.clone(),
            Url::parse("https://api.waqi.info").unwrap(),
            "secret",
        );
        (source, backend)
    }

    fn feed(pm25_aqi: f64, o3_aqi: Option<f64>) -> serde_json::Value {
        let mut iaqi = json!({"pm25": {"v": pm25_aqi}, "t": {"v": 21.5}});
        if let Some(o3) = o3_aqi {
            iaqi["o3"] = json!({"v": o3});
        }
        json!({
            "status": "ok",
            "data": {
                "aqi": 57,
                "city": {"name": "Quito, Ecuador", "geo": [-0.18, -78.47]},
                "iaqi": iaqi,
                "time": {"iso": "2024-10-05T09:00:00-05:00"}
            }
        })
    }

    fn here() -> Location {
        "-0.1807,-78.4678".parse().unwrap()
    }

    #[test]
    fn test_feed_url_for_coordinates() {
        let (source, _) = source(FakeBackend::new());
        let url = source.feed_url(&here()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.waqi.info/feed/geo:-0.1807;-78.4678/?token=secret"
        );
    }

    #[test]
    fn test_feed_url_for_city() {
        let (source, _) = source(FakeBackend::new());
        let url = source
            .feed_url(&Location::City("Madrid".to_string()))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.waqi.info/feed/madrid/?token=secret");
    }

    #[tokio::test]
    async fn test_fetch_converts_sub_indices() {
        let (source, _) = source(
            FakeBackend::new().with("/feed/", Canned::Json(feed(50.0, Some(100.0)))),
        );
        let readings = source.fetch(&here()).await.unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].pollutant(), Pollutant::Pm25);
        assert!((readings[0].concentration() - 12.0).abs() < 1e-9);
        assert_eq!(readings[1].pollutant(), Pollutant::Ozone);
        assert!((readings[1].concentration() - 70.0).abs() < 1e-9);
        assert_eq!(readings[0].origin(), "WAQI • Quito, Ecuador");
        assert_eq!(
            readings[0].timestamp(),
            DateTime::parse_from_rfc3339("2024-10-05T14:00:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_fetch_city() {
        let (source, backend) = source(
            FakeBackend::new().with("/feed/quito/", Canned::Json(feed(80.0, None))),
        );
        let readings = source
            .fetch(&Location::City("Quito".to_string()))
            .await
            .unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(backend.count("/feed/quito/"), 1);
    }

    #[tokio::test]
    async fn test_unused_non_numeric_sub_index_is_ignored() {
        let mut body = feed(57.0, None);
        body["data"]["iaqi"]["w"] = json!({"v": "-"});
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::Json(body)));

        let readings = source.fetch(&here()).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].pollutant(), Pollutant::Pm25);
    }

    #[tokio::test]
    async fn test_non_numeric_pollutant_sub_index_is_skipped() {
        let mut body = feed(57.0, None);
        body["data"]["iaqi"]["o3"] = json!({"v": "-"});
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::Json(body)));

        let readings = source.fetch(&here()).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].pollutant(), Pollutant::Pm25);
    }

    #[tokio::test]
    async fn test_dash_aqi_is_no_data() {
        let body = json!({
            "status": "ok",
            "data": {"aqi": "-", "iaqi": {}, "time": {"iso": "2024-10-05T09:00:00-05:00"}}
        });
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::Json(body)));
        assert!(source.fetch(&here()).await.unwrap_err().is_no_data());
    }

    #[tokio::test]
    async fn test_unknown_station_is_no_data() {
        let body = json!({"status": "error", "data": "Unknown station"});
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::Json(body)));
        assert!(source.fetch(&here()).await.unwrap_err().is_no_data());
    }

    #[tokio::test]
    async fn test_invalid_key_is_unauthorized() {
        let body = json!({"status": "error", "data": "Invalid key"});
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::Json(body)));
        let err = source.fetch(&here()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized { provider: "WAQI" }));
    }

    #[tokio::test]
    async fn test_missing_pollutants_is_no_data() {
        let body = json!({
            "status": "ok",
            "data": {
                "aqi": 20,
                "iaqi": {"pm10": {"v": 20}},
                "time": {"iso": "2024-10-05T09:00:00-05:00"}
            }
        });
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::Json(body)));
        assert!(source.fetch(&here()).await.unwrap_err().is_no_data());
    }

    #[tokio::test]
    async fn test_missing_time_is_invalid_response() {
        let body = json!({"status": "ok", "data": {"aqi": 20, "iaqi": {"pm25": {"v": 20}}}});
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::Json(body)));
        let err = source.fetch(&here()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { provider: "WAQI", .. }));
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let (source, _) = source(FakeBackend::new().with("/feed/", Canned::NetworkDown));
        assert!(source.fetch(&here()).await.unwrap_err().is_network_error());
    }
}

//! OpenAQ v3 client.
//!
//! OpenAQ only answers coordinate queries: nearby locations are listed first,
//! then the PM2.5 sensor of each location is asked for its recent
//! measurements.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::http::{ApiRequest, HttpBackend};
use super::{endpoint, AirQualitySource};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::reading::{Coordinates, Location, Pollutant, Reading, Source};

const PROVIDER: &str = "OpenAQ";

/// Parameter name OpenAQ uses for PM2.5 sensors.
const PM25_PARAMETER: &str = "pm25";

/// Measurements requested per sensor.
const MEASUREMENT_PAGE_SIZE: u32 = 100;

// === Wire format ===

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct LocationDto {
    id: i64,
    name: Option<String>,
    coordinates: Option<CoordinatesDto>,
    distance: Option<f64>,
    #[serde(default)]
    sensors: Vec<SensorDto>,
}

#[derive(Debug, Deserialize)]
struct CoordinatesDto {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct SensorDto {
    id: i64,
    parameter: Option<ParameterDto>,
}

#[derive(Debug, Deserialize)]
struct ParameterDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MeasurementDto {
    value: Option<f64>,
    period: Option<PeriodDto>,
}

#[derive(Debug, Deserialize)]
struct PeriodDto {
    #[serde(rename = "datetimeTo")]
    datetime_to: Option<DateTimeDto>,
}

#[derive(Debug, Deserialize)]
struct DateTimeDto {
    utc: Option<String>,
}

impl MeasurementDto {
    fn observed(&self) -> Option<(f64, DateTime<Utc>)> {
        let value = self.value.filter(|v| v.is_finite() && *v >= 0.0)?;
        let utc = self.period.as_ref()?.datetime_to.as_ref()?.utc.as_deref()?;
        let ts = DateTime::parse_from_rfc3339(utc).ok()?.with_timezone(&Utc);
        Some((value, ts))
    }
}

// === Public types ===

/// A monitoring site with a PM2.5 sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    /// OpenAQ location id.
    pub id: i64,
    /// Station name as reported by OpenAQ.
    pub name: String,
    /// Where the station is, when known.
    pub coordinates: Option<Coordinates>,
    /// Distance from the query point in metres, when known.
    pub distance_m: Option<f64>,
    /// Id of the station's PM2.5 sensor.
    pub pm25_sensor_id: i64,
}

impl Station {
    fn from_dto(dto: LocationDto) -> Option<Self> {
        let sensor = dto.sensors.iter().find(|s| {
            s.parameter
                .as_ref()
                .is_some_and(|p| p.name.eq_ignore_ascii_case(PM25_PARAMETER))
        })?;
        Some(Self {
            id: dto.id,
            name: dto.name.unwrap_or_else(|| format!("Location {}", dto.id)),
            coordinates: dto
                .coordinates
                .and_then(|c| Coordinates::new(c.latitude, c.longitude).ok()),
            distance_m: dto.distance,
            pm25_sensor_id: sensor.id,
        })
    }
}

/// A station together with its latest fresh PM2.5 reading, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    /// The station.
    pub station: Station,
    /// Latest fresh reading, `None` when the station has nothing recent.
    pub reading: Option<Reading>,
}

// === Source ===

/// Measured PM2.5 from OpenAQ v3.
pub struct OpenAqSource {
    backend: Arc<dyn HttpBackend>,
    base_url: Url,
    api_key: Option<String>,
    radius_km: u32,
    max_stations: u32,
    window: Duration,
    max_age: Duration,
}

impl std::fmt::Debug for OpenAqSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAqSource")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("radius_km", &self.radius_km)
            .finish_non_exhaustive()
    }
}

impl OpenAqSource {
    /// Create a source using the default search parameters.
    #[must_use]
    pub fn new(backend: Arc<dyn HttpBackend>, base_url: Url, api_key: Option<String>) -> Self {
        let search = SearchConfig::default();
        Self {
            backend,
            base_url,
            api_key,
            radius_km: search.radius_km,
            max_stations: search.max_stations,
            window: Duration::hours(i64::from(search.measurement_window_hours)),
            max_age: Duration::days(i64::from(search.max_age_days)),
        }
    }

    /// Apply search radius, station limit, and freshness settings.
    #[must_use]
    pub fn with_search(mut self, search: &SearchConfig) -> Self {
        self.radius_km = search.radius_km;
        self.max_stations = search.max_stations;
        self.window = Duration::hours(i64::from(search.measurement_window_hours));
        self.max_age = Duration::days(i64::from(search.max_age_days));
        self
    }

    fn request(&self, url: Url) -> ApiRequest {
        let request = ApiRequest::new(PROVIDER, url);
        match &self.api_key {
            Some(key) => request.with_header("X-API-Key", key.clone()),
            None => request,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let body = self.backend.get_text(&self.request(url)).await?;
        serde_json::from_str(&body).map_err(|e| Error::invalid_response(PROVIDER, e.to_string()))
    }

    /// Stations with a PM2.5 sensor near `coords`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    pub async fn find_stations(&self, coords: Coordinates) -> Result<Vec<Station>> {
        let mut url = endpoint(&self.base_url, &["locations"])?;
        url.query_pairs_mut()
            .append_pair(
                "coordinates",
                &format!("{},{}", coords.latitude, coords.longitude),
            )
            .append_pair("radius", &(self.radius_km * 1000).to_string())
            .append_pair("limit", &self.max_stations.to_string());

        let page: Page<LocationDto> = self.get(url).await?;
        let mut stations: Vec<Station> = page
            .results
            .into_iter()
            .filter_map(Station::from_dto)
            .collect();

        stations.sort_by(|a, b| match (a.distance_m, b.distance_m) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        debug!("OpenAQ: {} PM2.5 stations near {}", stations.len(), coords);
        Ok(stations)
    }

    /// Latest measurement of a sensor within the search window.
    ///
    /// The window is aligned to whole hours so that repeated requests share a
    /// URL and can be served from the response cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the response cannot be parsed,
    /// or the window reaches outside the representable time range.
    pub async fn latest_measurement(
        &self,
        sensor_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<(f64, DateTime<Utc>)>> {
        let hour = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
        let to = hour.checked_add_signed(Duration::hours(1));
        let from = to.and_then(|to| to.checked_sub_signed(self.window));
        let (Some(to), Some(from)) = (to, from) else {
            return Err(Error::internal(format!(
                "measurement window of {} hours is out of range",
                self.window.num_hours()
            )));
        };

        let mut url = endpoint(
            &self.base_url,
            &["sensors", &sensor_id.to_string(), "measurements"],
        )?;
        url.query_pairs_mut()
            .append_pair("datetime_from", &from.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("datetime_to", &to.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("limit", &MEASUREMENT_PAGE_SIZE.to_string())
            .append_pair("page", "1")
            .append_pair("order_by", "datetime")
            .append_pair("sort", "desc");

        let page: Page<MeasurementDto> = self.get(url).await?;
        Ok(page
            .results
            .iter()
            .filter_map(MeasurementDto::observed)
            .max_by_key(|(_, ts)| *ts))
    }

    /// Latest fresh reading for one station, `Ok(None)` when it is stale or empty.
    async fn station_reading(
        &self,
        station: &Station,
        now: DateTime<Utc>,
    ) -> Result<Option<Reading>> {
        let Some((value, ts)) = self.latest_measurement(station.pm25_sensor_id, now).await? else {
            debug!("OpenAQ: no measurements for station {}", station.name);
            return Ok(None);
        };

        if now.signed_duration_since(ts) > self.max_age {
            debug!(
                "OpenAQ: ignoring stale measurement from {} ({})",
                station.name, ts
            );
            return Ok(None);
        }

        let reading = Reading::new(
            Pollutant::Pm25,
            value,
            ts,
            Source::Measured,
            format!("{PROVIDER} • {}", station.name),
        )?;
        Ok(Some(reading))
    }

    /// Every nearby station with its latest fresh PM2.5 reading.
    ///
    /// Per-station failures leave that station's reading empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the station search itself fails.
    pub async fn nearby(&self, coords: Coordinates) -> Result<Vec<StationReport>> {
        let now = Utc::now();
        let mut reports = Vec::new();
        for station in self.find_stations(coords).await? {
            let reading = match self.station_reading(&station, now).await {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("OpenAQ: station {} failed: {}", station.name, e);
                    None
                }
            };
            reports.push(StationReport { station, reading });
        }
        Ok(reports)
    }
}

#[async_trait]
impl AirQualitySource for OpenAqSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, location: &Location) -> Result<Vec<Reading>> {
        let Some(coords) = location.coordinates() else {
            debug!("OpenAQ: city lookups are not supported ({})", location);
            return Err(Error::no_data(location));
        };

        let stations = self.find_stations(coords).await?;
        if stations.is_empty() {
            return Err(Error::no_data(location));
        }

        let now = Utc::now();
        let mut latest: Option<Reading> = None;
        let mut last_error: Option<Error> = None;

        for station in &stations {
            match self.station_reading(station, now).await {
                Ok(Some(reading)) => {
                    if latest
                        .as_ref()
                        .map_or(true, |best| reading.timestamp() > best.timestamp())
                    {
                        latest = Some(reading);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("OpenAQ: station {} failed: {}", station.name, e);
                    last_error = Some(e);
                }
            }
        }

        match (latest, last_error) {
            (Some(reading), _) => {
                info!(
                    "OpenAQ: {:.1} {} from {}",
                    reading.concentration(),
                    Pollutant::Pm25.unit(),
                    reading.origin()
                );
                Ok(vec![reading])
            }
            (None, Some(e)) if e.is_network_error() => Err(e),
            (None, _) => Err(Error::no_data(location)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::http::testing::{Canned, FakeBackend};
    use serde_json::json;

    const BASE: &str = "https://api.openaq.org/v3";

    fn location(
        id: i64,
        name: &str,
        distance: f64,
        sensor_id: i64,
        parameter: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "coordinates": {"latitude": 19.43, "longitude": -99.13},
            "distance": distance,
            "sensors": [{"id": sensor_id, "parameter": {"name": parameter, "units": "µg/m³"}}]
        })
    }

    fn measurement(value: f64, hours_ago: i64) -> serde_json::Value {
        let ts = Utc::now() - Duration::hours(hours_ago);
        json!({
            "value": value,
            "period": {"datetimeTo": {"utc": ts.to_rfc3339_opts(SecondsFormat::Secs, true)}}
        })
    }

    fn source(backend: FakeBackend) -> (OpenAqSource, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let source = OpenAqSource::new(
            backend.clone(),
            Url::parse(BASE).unwrap(),
            Some("key".to_string()),
        );
        (source, backend)
    }

    fn here() -> Location {
        "19.4326,-99.1332".parse().unwrap()
    }

    #[tokio::test]
    async fn test_find_stations_filters_and_sorts() {
        let (source, _) = source(FakeBackend::new().with(
            "/locations",
            Canned::Json(json!({"results": [
                location(1, "Far", 9000.0, 11, "pm25"),
                location(2, "Ozone only", 100.0, 22, "o3"),
                location(3, "Near", 500.0, 33, "pm25"),
            ]})),
        ));

        let stations = source
            .find_stations(here().coordinates().unwrap())
            .await
            .unwrap();
        let names: Vec<&str> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Far"]);
        assert_eq!(stations[0].pm25_sensor_id, 33);
    }

    #[tokio::test]
    async fn test_find_stations_query_parameters() {
        let (source, backend) = source(
            FakeBackend::new().with("/locations", Canned::Json(json!({"results": []}))),
        );
        source
            .find_stations(here().coordinates().unwrap())
            .await
            .unwrap();

        let url = &backend.requests()[0];
        assert!(url.starts_with("https://api.openaq.org/v3/locations?"));
        assert!(url.contains("radius=15000"));
        assert!(url.contains("limit=100"));
    }

    #[tokio::test]
    async fn test_fetch_picks_most_recent_across_stations() {
        let (source, _) = source(
            FakeBackend::new()
                .with(
                    "/locations",
                    Canned::Json(json!({"results": [
                        location(1, "Near", 100.0, 11, "pm25"),
                        location(2, "Far", 800.0, 22, "pm25"),
                    ]})),
                )
                .with(
                    "sensors/11/",
                    Canned::Json(json!({"results": [measurement(8.0, 5)]})),
                )
                .with(
                    "sensors/22/",
                    Canned::Json(json!({"results": [measurement(40.0, 1)]})),
                ),
        );

        let readings = source.fetch(&here()).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert!((readings[0].concentration() - 40.0).abs() < f64::EPSILON);
        assert_eq!(readings[0].origin(), "OpenAQ • Far");
        assert_eq!(readings[0].source(), Source::Measured);
    }

    #[tokio::test]
    async fn test_latest_measurement_ignores_entries_without_timestamp() {
        let (source, _) = source(FakeBackend::new().with(
            "sensors/11/",
            Canned::Json(json!({"results": [
                {"value": 99.0, "period": {"datetimeTo": null}},
                {"value": 99.0},
                measurement(7.0, 2),
                measurement(9.0, 3),
            ]})),
        ));

        let (value, _) = source
            .latest_measurement(11, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!((value - 7.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_an_error() {
        let (source, backend) = source(FakeBackend::new());
        let search = SearchConfig {
            measurement_window_hours: u32::MAX,
            ..SearchConfig::default()
        };
        let source = source.with_search(&search);

        let err = source.latest_measurement(11, Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_stale_measurements_are_ignored() {
        let (source, _) = source(
            FakeBackend::new()
                .with(
                    "/locations",
                    Canned::Json(json!({"results": [location(1, "Old", 100.0, 11, "pm25")]})),
                )
                .with(
                    "sensors/11/",
                    Canned::Json(json!({"results": [measurement(20.0, 24 * 8)]})),
                ),
        );

        let err = source.fetch(&here()).await.unwrap_err();
        assert!(err.is_no_data());
    }

    #[tokio::test]
    async fn test_station_failure_is_skipped() {
        let (source, _) = source(
            FakeBackend::new()
                .with(
                    "/locations",
                    Canned::Json(json!({"results": [
                        location(1, "Broken", 100.0, 11, "pm25"),
                        location(2, "Working", 200.0, 22, "pm25"),
                    ]})),
                )
                .with("sensors/11/", Canned::Status(500))
                .with(
                    "sensors/22/",
                    Canned::Json(json!({"results": [measurement(15.0, 1)]})),
                ),
        );

        let readings = source.fetch(&here()).await.unwrap();
        assert_eq!(readings[0].origin(), "OpenAQ • Working");
    }

    #[tokio::test]
    async fn test_all_stations_unreachable_is_network_error() {
        let (source, _) = source(
            FakeBackend::new()
                .with(
                    "/locations",
                    Canned::Json(json!({"results": [location(1, "A", 100.0, 11, "pm25")]})),
                )
                .with("sensors/11/", Canned::NetworkDown),
        );

        let err = source.fetch(&here()).await.unwrap_err();
        assert!(err.is_network_error());
    }

    #[tokio::test]
    async fn test_no_stations_is_no_data() {
        let (source, _) = source(
            FakeBackend::new().with("/locations", Canned::Json(json!({"results": []}))),
        );
        assert!(source.fetch(&here()).await.unwrap_err().is_no_data());
    }

    #[tokio::test]
    async fn test_city_is_no_data_without_request() {
        let (source, backend) = source(FakeBackend::new());
        let err = source
            .fetch(&Location::City("Quito".to_string()))
            .await
            .unwrap_err();
        assert!(err.is_no_data());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let (source, _) = source(
            FakeBackend::new().with("/locations", Canned::Json(json!({"results": "nope"}))),
        );
        let err = source.fetch(&here()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { provider: "OpenAQ", .. }));
    }

    #[tokio::test]
    async fn test_nearby_reports_every_station() {
        let (source, _) = source(
            FakeBackend::new()
                .with(
                    "/locations",
                    Canned::Json(json!({"results": [
                        location(1, "Live", 100.0, 11, "pm25"),
                        location(2, "Silent", 200.0, 22, "pm25"),
                    ]})),
                )
                .with(
                    "sensors/11/",
                    Canned::Json(json!({"results": [measurement(10.0, 1)]})),
                )
                .with("sensors/22/", Canned::Json(json!({"results": []}))),
        );

        let reports = source.nearby(here().coordinates().unwrap()).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].reading.is_some());
        assert!(reports[1].reading.is_none());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let (source, _) = source(FakeBackend::new());
        let shown = format!("{source:?}");
        assert!(!shown.contains("\"key\""));
        assert!(shown.contains("***"));
    }
}

//! External data provider adapters.
//!
//! Each adapter is an explicitly constructed component holding its own
//! configuration. Upstream calls are bounded by the configured timeout and
//! any failure degrades to a deterministic offline fallback keyed by
//! hashing the request identifier, so repeated calls for the same
//! identifier return stable demo data. Fetches never surface errors to
//! callers.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{
    config::ProviderConfig,
    errors::PortflowError,
    models::{Imo, ShipType, VesselPosition, WeatherObservation},
};

/// Seed ports used for fallback positions: (latitude, longitude, code, name)
const SEED_PORTS: [(f64, f64, &str, &str); 5] = [
    (14.6928, -17.4467, "DKR", "Port of Dakar"),
    (5.2565, -4.0192, "ABJ", "Port of Abidjan"),
    (6.4654, 3.4064, "LOS", "Port of Lagos"),
    (-33.9061, 18.4265, "CPT", "Port of Cape Town"),
    (-26.1715, 28.0318, "DUR", "Port of Durban"),
];

const SHIP_TYPES: [ShipType; 4] = [
    ShipType::Container,
    ShipType::Tanker,
    ShipType::Cargo,
    ShipType::Passenger,
];

/// Human-readable label for a vessel category, as upstream providers name
/// them
fn ship_type_label(ship_type: ShipType) -> &'static str {
    match ship_type {
        ShipType::Container => "Container Ship",
        ShipType::Tanker => "Tanker",
        ShipType::Cargo => "Cargo Ship",
        ShipType::Passenger => "Passenger Ship",
        ShipType::Fishing => "Fishing Vessel",
        ShipType::Other => "Vessel",
    }
}

fn hash_bytes(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Map a hash byte into [-1.0, 1.0]
fn signed_fraction(byte: u8) -> f64 {
    (byte as f64 / 255.0 - 0.5) * 2.0
}

/// Adapter for the upstream vessel-position service
pub struct VesselPositionProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UpstreamVessel {
    #[serde(rename = "SHIPNAME")]
    ship_name: Option<String>,
    #[serde(rename = "TYPE_NAME")]
    type_name: Option<String>,
    #[serde(rename = "LAT")]
    lat: Option<f64>,
    #[serde(rename = "LON")]
    lon: Option<f64>,
    #[serde(rename = "SPEED")]
    speed: Option<f64>,
    #[serde(rename = "HEADING")]
    heading: Option<f64>,
    #[serde(rename = "STATUS")]
    status: Option<String>,
    #[serde(rename = "DESTINATION")]
    destination: Option<String>,
    #[serde(rename = "ETA")]
    eta: Option<String>,
}

impl VesselPositionProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, PortflowError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// Fetch the current position for a ship, degrading to the offline
    /// fallback on any upstream problem.
    pub async fn fetch_position(&self, imo: &Imo) -> VesselPosition {
        if !self.config.has_real_api_key() {
            return self.fallback_position(imo);
        }

        match self.fetch_upstream(imo).await {
            Ok(Some(position)) => position,
            Ok(None) => {
                warn!(%imo, "Vessel provider returned no data, using fallback");
                self.fallback_position(imo)
            }
            Err(e) => {
                warn!(%imo, "Vessel provider call failed, using fallback: {e}");
                self.fallback_position(imo)
            }
        }
    }

    async fn fetch_upstream(&self, imo: &Imo) -> Result<Option<VesselPosition>, PortflowError> {
        let url = format!(
            "{}/exportvessel/v:5/{}/imo:{}/protocol:json",
            self.config.base_url,
            self.config.api_key,
            imo.value()
        );
        let vessels: Vec<UpstreamVessel> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(vessel) = vessels.into_iter().next() else {
            return Ok(None);
        };
        let (Some(lat), Some(lon)) = (vessel.lat, vessel.lon) else {
            return Ok(None);
        };

        info!(%imo, "Fetched live vessel position");
        Ok(Some(VesselPosition {
            name: vessel
                .ship_name
                .unwrap_or_else(|| format!("Ship {}", imo.value())),
            imo: imo.clone(),
            ship_type: parse_ship_type(vessel.type_name.as_deref()),
            latitude: lat,
            longitude: lon,
            speed: vessel.speed.unwrap_or(0.0),
            heading: vessel.heading.unwrap_or(0.0),
            status: vessel.status.unwrap_or_else(|| "Underway".to_string()),
            destination: vessel.destination.clone().unwrap_or_default(),
            destination_name: vessel.destination,
            eta: vessel.eta.as_deref().and_then(parse_upstream_eta),
            source: "marinetraffic".to_string(),
        }))
    }

    /// Deterministic demo position keyed by the IMO hash.
    ///
    /// Everything except the ETA (which is anchored to now) is stable
    /// across calls for the same identifier.
    fn fallback_position(&self, imo: &Imo) -> VesselPosition {
        let hash = hash_bytes(imo.value());

        let port_idx = (hash[0] as usize) % SEED_PORTS.len();
        let (base_lat, base_lon, _, _) = SEED_PORTS[port_idx];
        let next_idx = (port_idx + 1) % SEED_PORTS.len();
        let (_, _, next_code, next_name) = SEED_PORTS[next_idx];

        let ship_type = SHIP_TYPES[(hash[5] as usize) % SHIP_TYPES.len()];
        let days_ahead = (hash[6] % 7) as i64 + 1;

        VesselPosition {
            name: format!("{} {}", ship_type_label(ship_type), imo.value()),
            imo: imo.clone(),
            ship_type,
            latitude: base_lat + signed_fraction(hash[1]),
            longitude: base_lon + signed_fraction(hash[2]),
            speed: 8.0 + (hash[3] % 15) as f64,
            heading: (hash[4] as f64 / 255.0 * 360.0).round(),
            status: "Underway".to_string(),
            destination: next_code.to_string(),
            destination_name: Some(next_name.to_string()),
            eta: Some(Utc::now() + Duration::days(days_ahead)),
            source: "demo_fallback".to_string(),
        }
    }
}

fn parse_ship_type(type_name: Option<&str>) -> ShipType {
    let Some(name) = type_name else {
        return ShipType::Other;
    };
    let lower = name.to_lowercase();
    if lower.contains("container") {
        ShipType::Container
    } else if lower.contains("tanker") {
        ShipType::Tanker
    } else if lower.contains("cargo") {
        ShipType::Cargo
    } else if lower.contains("passenger") {
        ShipType::Passenger
    } else if lower.contains("fishing") {
        ShipType::Fishing
    } else {
        ShipType::Other
    }
}

fn parse_upstream_eta(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Adapter for the upstream weather service
pub struct WeatherProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UpstreamWeather {
    main: UpstreamWeatherMain,
    wind: UpstreamWind,
    weather: Vec<UpstreamCondition>,
    #[serde(default = "default_visibility")]
    visibility: i32,
}

#[derive(Debug, Deserialize)]
struct UpstreamWeatherMain {
    temp: f64,
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct UpstreamWind {
    speed: f64,
    #[serde(default)]
    deg: i32,
}

#[derive(Debug, Deserialize)]
struct UpstreamCondition {
    main: String,
    description: String,
}

fn default_visibility() -> i32 {
    10_000
}

/// Fallback weather patterns: (condition, description, temp range, humidity range)
const WEATHER_PATTERNS: [(&str, &str, (i32, i32), (i32, i32)); 3] = [
    ("Clear", "clear sky", (25, 35), (40, 70)),
    ("Clouds", "scattered clouds", (22, 30), (50, 80)),
    ("Rain", "light rain", (20, 28), (70, 90)),
];

impl WeatherProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, PortflowError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// Fetch current weather for a coordinate pair, degrading to the
    /// offline fallback on any upstream problem.
    pub async fn fetch_weather(&self, latitude: f64, longitude: f64) -> WeatherObservation {
        if !self.config.has_real_api_key() {
            return self.fallback_weather(latitude, longitude);
        }

        match self.fetch_upstream(latitude, longitude).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!(latitude, longitude, "Weather provider call failed, using fallback: {e}");
                self.fallback_weather(latitude, longitude)
            }
        }
    }

    async fn fetch_upstream(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherObservation, PortflowError> {
        let url = format!("{}/weather", self.config.base_url);
        let upstream: UpstreamWeather = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.config.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let condition = upstream.weather.into_iter().next().unwrap_or(UpstreamCondition {
            main: "Clear".to_string(),
            description: "clear sky".to_string(),
        });

        info!(latitude, longitude, "Fetched live weather");
        Ok(WeatherObservation {
            temperature: upstream.main.temp,
            humidity: upstream.main.humidity,
            wind_speed: upstream.wind.speed,
            wind_direction: upstream.wind.deg,
            condition: condition.main,
            description: condition.description,
            visibility: upstream.visibility,
            source: "openweathermap".to_string(),
        })
    }

    /// Deterministic demo weather keyed by the rounded coordinates.
    fn fallback_weather(&self, latitude: f64, longitude: f64) -> WeatherObservation {
        let hash = hash_bytes(&format!("{latitude:.2},{longitude:.2}"));

        let (condition, description, temp_range, humidity_range) =
            WEATHER_PATTERNS[(hash[0] as usize) % WEATHER_PATTERNS.len()];
        let temperature =
            temp_range.0 + (hash[1] as i32) % (temp_range.1 - temp_range.0 + 1);
        let humidity =
            humidity_range.0 + (hash[2] as i32) % (humidity_range.1 - humidity_range.0 + 1);

        WeatherObservation {
            temperature: temperature as f64,
            humidity,
            wind_speed: 2.0 + (hash[3] as f64 / 255.0) * 10.0,
            wind_direction: ((hash[4] as f64 / 255.0) * 360.0) as i32,
            condition: condition.to_string(),
            description: description.to_string(),
            visibility: 5_000 + (hash[5] as i32) * 40,
            source: "demo_mode".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn demo_config() -> ProviderConfig {
        ProviderConfig {
            api_key: "demo_key".to_string(),
            base_url: "https://upstream.test/api".to_string(),
            timeout: StdDuration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn fallback_position_is_stable_per_imo() {
        let provider = VesselPositionProvider::new(demo_config()).unwrap();
        let imo = Imo::try_from("IMO1234567").unwrap();

        let first = provider.fetch_position(&imo).await;
        let second = provider.fetch_position(&imo).await;

        assert_eq!(first.source, "demo_fallback");
        assert_eq!(first.latitude, second.latitude);
        assert_eq!(first.longitude, second.longitude);
        assert_eq!(first.speed, second.speed);
        assert_eq!(first.heading, second.heading);
        assert_eq!(first.name, second.name);
        assert_eq!(first.destination, second.destination);
    }

    #[tokio::test]
    async fn fallback_positions_differ_between_ships() {
        let provider = VesselPositionProvider::new(demo_config()).unwrap();
        let a = provider
            .fetch_position(&Imo::try_from("IMO1234567").unwrap())
            .await;
        let b = provider
            .fetch_position(&Imo::try_from("IMO7654321").unwrap())
            .await;

        assert!(a.latitude != b.latitude || a.longitude != b.longitude);
    }

    #[tokio::test]
    async fn fallback_position_stays_in_plausible_ranges() {
        let provider = VesselPositionProvider::new(demo_config()).unwrap();
        let position = provider
            .fetch_position(&Imo::try_from("9543756").unwrap())
            .await;

        assert!(position.latitude.abs() <= 90.0);
        assert!(position.longitude.abs() <= 180.0);
        assert!((8.0..=22.0).contains(&position.speed));
        assert!((0.0..=360.0).contains(&position.heading));
        assert!(position.eta.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn fallback_weather_is_stable_per_coordinate() {
        let provider = WeatherProvider::new(demo_config()).unwrap();

        let first = provider.fetch_weather(14.6928, -17.4467).await;
        let second = provider.fetch_weather(14.6928, -17.4467).await;

        assert_eq!(first, second);
        assert_eq!(first.source, "demo_mode");
    }

    #[tokio::test]
    async fn fallback_weather_stays_in_plausible_ranges() {
        let provider = WeatherProvider::new(demo_config()).unwrap();
        let observation = provider.fetch_weather(-33.9061, 18.4265).await;

        assert!((20.0..=35.0).contains(&observation.temperature));
        assert!((40..=90).contains(&observation.humidity));
        assert!((2.0..=12.0).contains(&observation.wind_speed));
        assert!((0..360).contains(&observation.wind_direction));
        assert!((5_000..=15_200).contains(&observation.visibility));
    }

    #[tokio::test]
    async fn fallback_ship_names_use_display_labels() {
        let provider = VesselPositionProvider::new(demo_config()).unwrap();
        let imo = Imo::try_from("IMO1234567").unwrap();

        let position = provider.fetch_position(&imo).await;

        let expected = format!("{} {}", ship_type_label(position.ship_type), imo.value());
        assert_eq!(position.name, expected);
        // Labels are the upstream spellings, not enum variant names
        assert!(ship_type_label(ShipType::Container).ends_with("Ship"));
        assert_eq!(ship_type_label(ShipType::Fishing), "Fishing Vessel");
    }

    #[test]
    fn ship_type_parsing_covers_common_labels() {
        assert_eq!(parse_ship_type(Some("Container Ship")), ShipType::Container);
        assert_eq!(parse_ship_type(Some("Crude Oil Tanker")), ShipType::Tanker);
        assert_eq!(parse_ship_type(Some("General Cargo")), ShipType::Cargo);
        assert_eq!(parse_ship_type(None), ShipType::Other);
    }
}

//! Data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PortflowError;

/// International Maritime Organization (IMO) ship identifier.
///
/// Stored as the upstream provider reports it: an optional `IMO` prefix
/// followed by up to seven digits. Uniquely identifies a ship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct Imo(String);

impl TryFrom<&str> for Imo {
    type Error = PortflowError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim().to_ascii_uppercase();
        let digits = trimmed.strip_prefix("IMO").unwrap_or(&trimmed);
        if digits.is_empty()
            || digits.len() > 7
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(PortflowError::InvalidImo(value.to_string()));
        }
        Ok(Self(trimmed))
    }
}

impl Imo {
    /// Get the raw identifier as stored
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Imo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broad vessel category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ship_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShipType {
    Container,
    Tanker,
    Cargo,
    Passenger,
    Fishing,
    Other,
}

/// A tracked ship, updated in place by position sync.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Ship {
    pub id: i64,
    pub name: String,
    pub imo: Imo,
    pub ship_type: ShipType,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    /// Speed over ground in knots
    pub current_speed: Option<f64>,
    /// Heading in degrees
    pub current_heading: Option<f64>,
    pub status: String,
    pub destination_port_id: Option<i64>,
    /// Destination label as reported by the position provider
    pub destination_name: Option<String>,
    pub expected_arrival: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Ship {
    /// Current position as (latitude, longitude), if both are known
    pub fn current_position(&self) -> Option<(f64, f64)> {
        match (self.current_latitude, self.current_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Port reference data. Immutable after seeding.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Port {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub city: String,
    /// UN/LOCODE-style short code, unique
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A point-in-time weather observation for a port. Append-only.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeatherReading {
    pub id: i64,
    pub port_id: i64,
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: i32,
    /// Wind speed in m/s, as received from the provider
    pub wind_speed: f64,
    /// Wind direction in degrees
    pub wind_direction: i32,
    /// Condition label, e.g. "Clear", "Clouds", "Rain"
    pub condition: String,
    pub description: String,
    /// Visibility in meters
    pub visibility: i32,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Storm,
    HighWind,
    Fog,
    HeavyRain,
    HeatWave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

/// Weather alert derived from a reading that crossed a threshold.
///
/// The `is_active` flag is never cleared automatically; alerts are
/// superseded rather than expired.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeatherAlert {
    pub id: i64,
    pub port_id: i64,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Delay,
    Weather,
    Position,
    Arrival,
    Departure,
    EtaChange,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<AlertSeverity> for Severity {
    fn from(value: AlertSeverity) -> Self {
        match value {
            AlertSeverity::Low => Severity::Low,
            AlertSeverity::Medium => Severity::Medium,
            AlertSeverity::High => Severity::High,
        }
    }
}

/// A user-facing notification event.
///
/// Owned by exactly one user; the only mutation after creation is the
/// one-way unread -> read transition.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub severity: Severity,
    pub is_read: bool,
    pub is_actionable: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    /// Advisory only; nothing filters or sweeps by expiry
    pub expires_at: Option<DateTime<Utc>>,
    pub related_ship_id: Option<i64>,
    /// Schemaless per-type payload, see the engine for documented keys
    pub metadata: serde_json::Value,
}

/// Insert payload for a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub severity: Severity,
    pub is_actionable: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub related_ship_id: Option<i64>,
    pub metadata: serde_json::Value,
}

impl NewNotification {
    pub fn new(
        user_id: i64,
        title: impl Into<String>,
        message: impl Into<String>,
        notification_type: NotificationType,
        severity: Severity,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            severity,
            is_actionable: true,
            expires_at: None,
            related_ship_id: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn related_ship(mut self, ship_id: i64) -> Self {
        self.related_ship_id = Some(ship_id);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Inquiry,
    Support,
    Alert,
    General,
}

/// User-to-user message, optionally part of a reply chain.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub subject: String,
    pub content: String,
    pub message_type: MessageType,
    pub is_urgent: bool,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub related_ship_id: Option<i64>,
    /// Parent in a reply chain; the application keeps chains acyclic
    pub parent_message_id: Option<i64>,
}

/// Append-only point ledger row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PointActivity {
    pub id: i64,
    pub user_id: i64,
    pub activity_type: String,
    pub points: i32,
    pub timestamp: DateTime<Utc>,
    /// Status returned by the notarization relay, if the publish succeeded
    pub hcs_status: Option<String>,
    /// Relay transaction id, if the publish succeeded
    pub hcs_tx_id: Option<String>,
}

/// Running per-user point aggregate.
///
/// `total_points` equals the sum of all point activities for the user.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserScore {
    pub user_id: i64,
    pub total_points: i64,
    pub level: String,
}

/// Ship position report from the vessel provider (or its offline fallback)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselPosition {
    pub name: String,
    pub imo: Imo,
    pub ship_type: ShipType,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground in knots
    pub speed: f64,
    /// Heading in degrees
    pub heading: f64,
    pub status: String,
    /// Destination port code as reported upstream
    pub destination: String,
    pub destination_name: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    /// Where the report came from, e.g. "marinetraffic" or "demo_fallback"
    pub source: String,
}

/// Weather observation from the weather provider (or its offline fallback)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub wind_direction: i32,
    pub condition: String,
    pub description: String,
    pub visibility: i32,
    pub source: String,
}

/// Candidate weather alert proposed by the rule evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Candidate notification proposed by the rule evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationCandidate {
    pub notification_type: NotificationType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imo_accepts_plain_digits() {
        let imo = Imo::try_from("9543756").unwrap();
        assert_eq!(imo.value(), "9543756");
    }

    #[test]
    fn imo_accepts_prefixed_form() {
        let imo = Imo::try_from("imo1234567").unwrap();
        assert_eq!(imo.value(), "IMO1234567");
    }

    #[test]
    fn imo_rejects_empty_and_garbage() {
        assert!(Imo::try_from("").is_err());
        assert!(Imo::try_from("IMO").is_err());
        assert!(Imo::try_from("12345678").is_err());
        assert!(Imo::try_from("MAERSK").is_err());
    }

    #[test]
    fn alert_severity_widens_to_severity() {
        assert_eq!(Severity::from(AlertSeverity::High), Severity::High);
        assert_eq!(Severity::from(AlertSeverity::Low), Severity::Low);
    }

    #[test]
    fn notification_types_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationType::EtaChange).unwrap(),
            r#""eta_change""#
        );
        assert_eq!(
            serde_json::to_string(&AlertType::HighWind).unwrap(),
            r#""high_wind""#
        );
    }
}

//! Threshold rules for weather alerts and ship notifications.
//!
//! Everything in this module is a pure function of its inputs; persistence
//! and provider access stay in the callers.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::{
    AlertCandidate, AlertSeverity, AlertType, NotificationCandidate, NotificationType, Severity,
    Ship, WeatherReading,
};

/// Wind speed above which a high-wind alert is raised, m/s
pub const HIGH_WIND_THRESHOLD: f64 = 15.0;

/// Visibility below which a fog alert is raised, meters. Exclusive bound.
pub const FOG_VISIBILITY_THRESHOLD: i32 = 1000;

/// Half-width in degrees of the bounding box used to match ships to a
/// port's weather alerts
pub const ALERT_RANGE_DEGREES: f64 = 3.0;

/// Evaluate a weather observation against the fixed alert thresholds.
///
/// Returns zero or more candidate alerts; the caller decides whether and
/// where to persist them.
pub fn evaluate_reading(reading: &WeatherReading) -> Vec<AlertCandidate> {
    let mut candidates = Vec::new();

    if reading.wind_speed > HIGH_WIND_THRESHOLD {
        candidates.push(AlertCandidate {
            alert_type: AlertType::HighWind,
            severity: AlertSeverity::High,
            message: format!("High winds: {} m/s", reading.wind_speed),
        });
    }

    if reading.visibility < FOG_VISIBILITY_THRESHOLD {
        candidates.push(AlertCandidate {
            alert_type: AlertType::Fog,
            severity: AlertSeverity::Medium,
            message: format!("Fog, visibility {} m", reading.visibility),
        });
    }

    if reading.condition.to_lowercase().contains("rain") {
        candidates.push(AlertCandidate {
            alert_type: AlertType::HeavyRain,
            severity: AlertSeverity::Medium,
            message: "Heavy rain".to_string(),
        });
    }

    candidates
}

/// Hours a ship is past its expected arrival, floored at zero.
pub fn delay_hours(ship: &Ship, now: DateTime<Utc>) -> f64 {
    match ship.expected_arrival {
        Some(eta) => ((now - eta).num_seconds() as f64 / 3600.0).max(0.0),
        None => 0.0,
    }
}

/// Evaluate a ship's state for polled notification candidates.
///
/// Only the delay rule is discovered by polling; arrival, departure and
/// ETA-change notifications are raised directly by whatever mutates the
/// ship, and position updates are unconditional.
pub fn evaluate_ship(ship: &Ship, now: DateTime<Utc>) -> Vec<NotificationCandidate> {
    let mut candidates = Vec::new();

    if let Some(eta) = ship.expected_arrival {
        if eta < now && ship.destination_port_id.is_some() {
            let destination = ship
                .destination_name
                .clone()
                .unwrap_or_else(|| "its destination".to_string());
            candidates.push(NotificationCandidate {
                notification_type: NotificationType::Delay,
                severity: Severity::High,
                title: format!("Delay on ship {}", ship.name),
                message: format!(
                    "Ship {} is past its expected arrival at {destination}",
                    ship.name
                ),
                metadata: json!({
                    "expected_arrival": eta,
                    "current_delay_hours": delay_hours(ship, now),
                }),
            });
        }
    }

    candidates
}

/// Whether a ship's known position falls inside the alert bounding box
/// around a port.
///
/// Longitude wraparound at the antimeridian is not handled; the box is a
/// crude proximity proxy.
pub fn within_alert_range(ship: &Ship, port_latitude: f64, port_longitude: f64) -> bool {
    match ship.current_position() {
        Some((lat, lon)) => {
            (lat - port_latitude).abs() <= ALERT_RANGE_DEGREES
                && (lon - port_longitude).abs() <= ALERT_RANGE_DEGREES
        }
        None => false,
    }
}

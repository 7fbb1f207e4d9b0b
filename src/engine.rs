//! Notification engine.
//!
//! Watches ship and weather state, turns rule-evaluator candidates into
//! persisted notifications under per-type cooldowns, and exposes the
//! read-side operations. Scan entry points never propagate errors; they
//! log and return a best-effort outcome.

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{error, info};

use crate::{
    database::Database,
    errors::PortflowError,
    models::{
        NewNotification, Notification, NotificationType, Port, Severity, Ship, WeatherAlert,
    },
    rules,
};

/// Cooldown window for a notification type.
///
/// `None` means the type is one-shot per triggering event and is never
/// deduplicated.
pub fn cooldown(notification_type: NotificationType) -> Option<Duration> {
    match notification_type {
        NotificationType::Delay => Some(Duration::hours(24)),
        NotificationType::Weather => Some(Duration::hours(6)),
        NotificationType::Position
        | NotificationType::Arrival
        | NotificationType::Departure
        | NotificationType::EtaChange
        | NotificationType::System => None,
    }
}

/// Best-effort result of a scan entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Notifications actually created
    pub created: u64,
    /// Human-readable summary, including swallowed failures
    pub summary: String,
}

pub struct NotificationEngine {
    db: Database,
}

impl NotificationEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether a notification may be created for the triple right now.
    ///
    /// The check-then-create sequence is not atomic; concurrent scans for
    /// the same triple can produce a bounded number of duplicates.
    async fn permit(
        &self,
        user_id: i64,
        notification_type: NotificationType,
        ship_id: i64,
    ) -> Result<bool, PortflowError> {
        match cooldown(notification_type) {
            None => Ok(true),
            Some(window) => {
                let since = Utc::now() - window;
                let exists = self
                    .db
                    .has_recent_notification(user_id, notification_type, ship_id, since)
                    .await?;
                Ok(!exists)
            }
        }
    }

    /// Scan for ships past their expected arrival and notify their trackers.
    pub async fn scan_delays(&self) -> ScanOutcome {
        let mut created = 0u64;
        let mut failures = 0u64;
        let now = Utc::now();

        let ships = match self.db.delayed_tracked_ships(now).await {
            Ok(ships) => ships,
            Err(e) => {
                error!("Delay scan could not list ships: {e}");
                return ScanOutcome {
                    created: 0,
                    summary: format!("Delay scan failed: {e}"),
                };
            }
        };

        for ship in &ships {
            for candidate in rules::evaluate_ship(ship, now) {
                let result = self
                    .fan_out(
                        ship,
                        &candidate.title,
                        &candidate.message,
                        candidate.notification_type,
                        candidate.severity,
                        candidate.metadata,
                        true,
                    )
                    .await;
                match result {
                    Ok(count) => created += count,
                    Err(e) => {
                        failures += 1;
                        error!(ship = %ship.imo, "Delay notification failed: {e}");
                    }
                }
            }
        }

        let summary = format!("Created {created} delay notifications ({failures} failures)");
        info!("{summary}");
        ScanOutcome { created, summary }
    }

    /// Scan active weather alerts and notify trackers of ships inside each
    /// alert's bounding box.
    pub async fn scan_weather_alerts(&self) -> ScanOutcome {
        let mut created = 0u64;
        let mut failures = 0u64;

        let alerts = match self.db.active_alerts().await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!("Weather scan could not list alerts: {e}");
                return ScanOutcome {
                    created: 0,
                    summary: format!("Weather scan failed: {e}"),
                };
            }
        };

        for alert in &alerts {
            match self.notify_alert(alert).await {
                Ok(count) => created += count,
                Err(e) => {
                    failures += 1;
                    error!(alert_id = alert.id, "Weather alert fan-out failed: {e}");
                }
            }
        }

        let summary = format!("Created {created} weather notifications ({failures} failures)");
        info!("{summary}");
        ScanOutcome { created, summary }
    }

    async fn notify_alert(&self, alert: &WeatherAlert) -> Result<u64, PortflowError> {
        let port = self.db.port_by_id(alert.port_id).await?;
        let ships = self
            .db
            .ships_in_box(port.latitude, port.longitude, rules::ALERT_RANGE_DEGREES)
            .await?;

        let mut created = 0u64;
        for ship in &ships {
            // SQL prefilter; the evaluator makes the final call
            if !rules::within_alert_range(ship, port.latitude, port.longitude) {
                continue;
            }
            for user_id in self.db.trackers_of(ship.id).await? {
                if !self.permit(user_id, NotificationType::Weather, ship.id).await? {
                    continue;
                }
                let new = NewNotification::new(
                    user_id,
                    format!("Weather alert - {}", ship.name),
                    format!(
                        "{} - may affect your tracked ship {} near {}",
                        alert.message, ship.name, port.name
                    ),
                    NotificationType::Weather,
                    Severity::from(alert.severity),
                )
                .related_ship(ship.id)
                .metadata(json!({
                    "alert_type": alert.alert_type,
                    "port_name": port.name,
                    "port_country": port.country,
                }));
                self.db.create_notification(&new).await?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// Create a notification for every tracker of a ship, honoring the
    /// type's cooldown when `deduplicate` is set.
    async fn fan_out(
        &self,
        ship: &Ship,
        title: &str,
        message: &str,
        notification_type: NotificationType,
        severity: Severity,
        metadata: serde_json::Value,
        deduplicate: bool,
    ) -> Result<u64, PortflowError> {
        let mut created = 0u64;
        for user_id in self.db.trackers_of(ship.id).await? {
            if deduplicate && !self.permit(user_id, notification_type, ship.id).await? {
                continue;
            }
            let new = NewNotification::new(user_id, title, message, notification_type, severity)
                .related_ship(ship.id)
                .metadata(metadata.clone());
            self.db.create_notification(&new).await?;
            created += 1;
        }
        Ok(created)
    }

    /// Unconditional position-update notification for every tracker.
    pub async fn notify_position_update(
        &self,
        ship: &Ship,
        old_position: Option<(f64, f64)>,
    ) -> Result<u64, PortflowError> {
        let heading = ship
            .current_heading
            .map(|h| format!("{h}"))
            .unwrap_or_else(|| "unknown".to_string());
        let speed = ship
            .current_speed
            .map(|s| format!("{s}"))
            .unwrap_or_else(|| "unknown".to_string());

        self.fan_out(
            ship,
            &format!("Position update - {}", ship.name),
            &format!(
                "Ship {} position updated - heading {heading} deg at {speed} kn",
                ship.name
            ),
            NotificationType::Position,
            Severity::Low,
            json!({
                "latitude": ship.current_latitude,
                "longitude": ship.current_longitude,
                "speed": ship.current_speed,
                "heading": ship.current_heading,
                "position_changed": old_position.is_some(),
            }),
            false,
        )
        .await
    }

    /// Unconditional arrival notification for every tracker.
    pub async fn notify_arrival(&self, ship: &Ship) -> Result<u64, PortflowError> {
        let destination = ship
            .destination_name
            .clone()
            .unwrap_or_else(|| "its destination".to_string());
        self.fan_out(
            ship,
            &format!("Ship {} arrived", ship.name),
            &format!("Ship {} has arrived at {destination}", ship.name),
            NotificationType::Arrival,
            Severity::Medium,
            json!({
                "destination": ship.destination_name,
                "arrival_time": Utc::now(),
            }),
            false,
        )
        .await
    }

    /// Unconditional departure notification for every tracker.
    pub async fn notify_departure(
        &self,
        ship: &Ship,
        departure_port: &Port,
    ) -> Result<u64, PortflowError> {
        let next = ship
            .destination_name
            .clone()
            .unwrap_or_else(|| "its next destination".to_string());
        self.fan_out(
            ship,
            &format!("Ship {} departed", ship.name),
            &format!(
                "Ship {} has departed {} bound for {next}",
                ship.name, departure_port.name
            ),
            NotificationType::Departure,
            Severity::Low,
            json!({ "departure_port": departure_port.name }),
            false,
        )
        .await
    }

    /// Unconditional ETA-change notification for every tracker.
    pub async fn notify_eta_change(
        &self,
        ship: &Ship,
        old_eta: chrono::DateTime<Utc>,
        new_eta: chrono::DateTime<Utc>,
    ) -> Result<u64, PortflowError> {
        self.fan_out(
            ship,
            &format!("ETA change - {}", ship.name),
            &format!(
                "Expected arrival for ship {} moved from {} to {}",
                ship.name,
                old_eta.format("%Y-%m-%d %H:%M"),
                new_eta.format("%Y-%m-%d %H:%M")
            ),
            NotificationType::EtaChange,
            Severity::Medium,
            json!({ "old_eta": old_eta, "new_eta": new_eta }),
            false,
        )
        .await
    }

    /// Notifications for a user, newest first.
    pub async fn notifications_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Notification>, PortflowError> {
        self.db.notifications_for_user(user_id).await
    }

    /// One-way unread -> read transition. NotFound if the notification does
    /// not exist or belongs to another user.
    pub async fn mark_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Notification, PortflowError> {
        self.db.mark_notification_read(notification_id, user_id).await
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, PortflowError> {
        self.db.unread_notification_count(user_id).await
    }
}

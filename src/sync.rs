//! Provider-driven refresh of domain state.
//!
//! Pulls current positions and weather from the provider adapters, writes
//! them into the store, derives weather alerts through the rule evaluator,
//! and raises the lifecycle notifications that belong to state mutation
//! (position updates and ETA changes). Per-item failures are logged and
//! skipped so one bad row never aborts a sweep.

use chrono::{Duration, Utc};
use tracing::{error, info};

use crate::{
    database::Database,
    engine::NotificationEngine,
    errors::PortflowError,
    models::{Imo, Ship},
    providers::{VesselPositionProvider, WeatherProvider},
    rules,
};

/// Validity window attached to alerts derived from a fresh reading
const ALERT_WINDOW_HOURS: i64 = 6;

/// Best-effort result of a sync sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub updated: u64,
    pub summary: String,
}

pub struct SyncService {
    db: Database,
    vessels: VesselPositionProvider,
    weather: WeatherProvider,
    engine: NotificationEngine,
}

impl SyncService {
    pub fn new(
        db: Database,
        vessels: VesselPositionProvider,
        weather: WeatherProvider,
        engine: NotificationEngine,
    ) -> Self {
        Self {
            db,
            vessels,
            weather,
            engine,
        }
    }

    /// Refresh every ship's position from the vessel provider.
    pub async fn sync_ship_positions(&self) -> SyncOutcome {
        let ships = match self.db.all_ships().await {
            Ok(ships) => ships,
            Err(e) => {
                error!("Position sync could not list ships: {e}");
                return SyncOutcome {
                    updated: 0,
                    summary: format!("Position sync failed: {e}"),
                };
            }
        };

        let total = ships.len();
        let mut updated = 0u64;
        for ship in ships {
            match self.sync_one_ship(&ship).await {
                Ok(()) => updated += 1,
                Err(e) => error!(imo = %ship.imo, "Position sync failed for ship: {e}"),
            }
        }

        let summary = format!("Updated {updated} of {total} ship positions");
        info!("{summary}");
        SyncOutcome { updated, summary }
    }

    async fn sync_one_ship(&self, ship: &Ship) -> Result<(), PortflowError> {
        let position = self.vessels.fetch_position(&ship.imo).await;
        let old_position = ship.current_position();
        let old_eta = ship.expected_arrival;

        let refreshed = self.db.upsert_ship(&position).await?;

        if let (Some(old), Some(new)) = (old_eta, refreshed.expected_arrival) {
            if old != new {
                self.engine.notify_eta_change(&refreshed, old, new).await?;
            }
        }
        self.engine
            .notify_position_update(&refreshed, old_position)
            .await?;
        Ok(())
    }

    /// Refresh weather for every port, recording readings and deriving
    /// alerts from them.
    pub async fn sync_port_weather(&self) -> SyncOutcome {
        let ports = match self.db.all_ports().await {
            Ok(ports) => ports,
            Err(e) => {
                error!("Weather sync could not list ports: {e}");
                return SyncOutcome {
                    updated: 0,
                    summary: format!("Weather sync failed: {e}"),
                };
            }
        };

        let total = ports.len();
        let mut updated = 0u64;
        for port in ports {
            let observation = self.weather.fetch_weather(port.latitude, port.longitude).await;
            let result: Result<(), PortflowError> = async {
                let reading = self.db.insert_reading(port.id, &observation).await?;
                let now = Utc::now();
                for candidate in rules::evaluate_reading(&reading) {
                    self.db
                        .insert_alert(
                            port.id,
                            &candidate,
                            now,
                            now + Duration::hours(ALERT_WINDOW_HOURS),
                        )
                        .await?;
                    info!(port = %port.name, alert = ?candidate.alert_type, "Weather alert raised");
                }
                Ok(())
            }
            .await;

            match result {
                Ok(()) => updated += 1,
                Err(e) => error!(port = %port.name, "Weather sync failed for port: {e}"),
            }
        }

        let summary = format!("Updated weather for {updated} of {total} ports");
        info!("{summary}");
        SyncOutcome { updated, summary }
    }

    /// Look a ship up with the position provider, store or refresh it, and
    /// subscribe the user to it. Idempotent for an already-tracking user.
    pub async fn track_ship(&self, imo: &Imo, user_id: i64) -> Result<Ship, PortflowError> {
        let position = self.vessels.fetch_position(imo).await;
        let ship = self.db.upsert_ship(&position).await?;
        self.db.add_tracker(ship.id, user_id).await?;
        info!(%imo, user_id, "User now tracking ship");
        Ok(ship)
    }
}

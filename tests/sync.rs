//! Provider sync integration tests.
//!
//! Providers run with demo keys, so every fetch takes the deterministic
//! offline fallback and no network access happens.

use std::time::Duration;

use sqlx::PgPool;

use portflow::{
    config::ProviderConfig,
    database::Database,
    engine::NotificationEngine,
    models::{Imo, NotificationType},
    providers::{VesselPositionProvider, WeatherProvider},
    sync::SyncService,
};

fn demo_provider_config() -> ProviderConfig {
    ProviderConfig {
        api_key: "demo_key".to_string(),
        base_url: "https://upstream.test/api".to_string(),
        timeout: Duration::from_secs(10),
    }
}

fn sync_service(db: &Database) -> SyncService {
    SyncService::new(
        db.clone(),
        VesselPositionProvider::new(demo_provider_config()).unwrap(),
        WeatherProvider::new(demo_provider_config()).unwrap(),
        NotificationEngine::new(db.clone()),
    )
}

#[sqlx::test]
async fn track_ship_is_idempotent_per_user(pool: PgPool) {
    let db = Database::new(pool).await.unwrap();
    let sync = sync_service(&db);
    let user = db.create_user("amina", false).await.unwrap();
    let imo = Imo::try_from("IMO1234567").unwrap();

    let ship = sync.track_ship(&imo, user).await.unwrap();
    let again = sync.track_ship(&imo, user).await.unwrap();

    assert_eq!(ship.id, again.id);
    assert_eq!(ship.imo, imo);
    assert!(ship.current_position().is_some());
    assert_eq!(db.trackers_of(ship.id).await.unwrap(), vec![user]);
}

#[sqlx::test]
async fn position_sync_raises_lifecycle_notifications(pool: PgPool) {
    let db = Database::new(pool).await.unwrap();
    let sync = sync_service(&db);
    let user = db.create_user("amina", false).await.unwrap();

    let ship = sync
        .track_ship(&Imo::try_from("IMO1234567").unwrap(), user)
        .await
        .unwrap();
    assert!(ship.expected_arrival.is_some());

    let outcome = sync.sync_ship_positions().await;
    assert_eq!(outcome.updated, 1);

    let notifications = db.notifications_for_user(user).await.unwrap();
    let types: Vec<_> = notifications
        .iter()
        .map(|n| n.notification_type)
        .collect();
    // The fallback ETA is anchored to the sync time, so it moved: one
    // eta_change plus the unconditional position update
    assert!(types.contains(&NotificationType::Position));
    assert!(types.contains(&NotificationType::EtaChange));
    assert_eq!(notifications.len(), 2);
}

#[sqlx::test]
async fn weather_sync_records_a_reading_per_port(pool: PgPool) {
    let db = Database::new(pool).await.unwrap();
    let sync = sync_service(&db);

    let dakar = db
        .create_port("Port of Dakar", "Senegal", "Dakar", "DKR", 14.6928, -17.4467)
        .await
        .unwrap();
    db.create_port("Port of Cape Town", "South Africa", "Cape Town", "CPT", -33.9061, 18.4265)
        .await
        .unwrap();

    let outcome = sync.sync_port_weather().await;
    assert_eq!(outcome.updated, 2);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM weather_readings WHERE port_id = $1")
            .bind(dakar.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(count, 1);

    // A second sweep appends, never overwrites
    sync.sync_port_weather().await;
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM weather_readings WHERE port_id = $1")
            .bind(dakar.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(count, 2);
}

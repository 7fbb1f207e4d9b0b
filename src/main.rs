//! PortFlow backend runner
//!
//! Periodically syncs provider data and runs the notification scans. The
//! interval loop here stands in for an external scheduler; each tick is an
//! independent best-effort unit of work.

use tokio::signal;
use tokio::time::interval;
use tracing::info;

use portflow::{
    config::AppConfig,
    database::Database,
    engine::NotificationEngine,
    errors::PortflowError,
    providers::{VesselPositionProvider, WeatherProvider},
    sync::SyncService,
};

#[tokio::main]
async fn main() -> Result<(), PortflowError> {
    // Pick up a local .env before anything reads the environment
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration, preferring environment variables and config files
    let config = AppConfig::load()?;
    config.validate()?;

    let db = Database::from_config(&config.database).await?;

    let vessels = VesselPositionProvider::new(config.vessel_provider.clone())?;
    let weather = WeatherProvider::new(config.weather_provider.clone())?;

    let engine = NotificationEngine::new(db.clone());
    let sync = SyncService::new(
        db.clone(),
        vessels,
        weather,
        NotificationEngine::new(db.clone()),
    );

    let shutdown_signal = signal::ctrl_c();

    tokio::select! {
        _ = run_scheduler(&config, &engine, &sync) => {
            info!("Scheduler loop ended");
        }
        _ = shutdown_signal => {
            info!("Received shutdown signal");
        }
    }

    Ok(())
}

async fn run_scheduler(config: &AppConfig, engine: &NotificationEngine, sync: &SyncService) {
    let mut sync_tick = interval(config.scan.sync_interval);
    let mut delay_tick = interval(config.scan.delay_interval);
    let mut weather_tick = interval(config.scan.weather_interval);

    loop {
        tokio::select! {
            _ = sync_tick.tick() => {
                let positions = sync.sync_ship_positions().await;
                info!("{}", positions.summary);
                let weather = sync.sync_port_weather().await;
                info!("{}", weather.summary);
            }
            _ = delay_tick.tick() => {
                let outcome = engine.scan_delays().await;
                info!("{}", outcome.summary);
            }
            _ = weather_tick.tick() => {
                let outcome = engine.scan_weather_alerts().await;
                info!("{}", outcome.summary);
            }
        }
    }
}

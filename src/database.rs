//! Persistence layer over Postgres.
//!
//! All SQL lives here; the engine and services call these methods and never
//! build queries themselves.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use tracing::info;

use crate::{
    config::DatabaseConfig,
    errors::PortflowError,
    models::{
        AlertCandidate, Imo, Message, MessageType, NewNotification, Notification,
        NotificationType, Ship, VesselPosition, WeatherAlert, WeatherObservation, WeatherReading,
        PointActivity, Port, UserScore,
    },
};

/// Database handle for the PortFlow domain store
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Wrap an existing pool and run pending migrations
    pub async fn new(pool: PgPool) -> Result<Self, PortflowError> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PortflowError::MigrationError(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Connect to the given database and run pending migrations
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, PortflowError> {
        config.validate()?;
        info!("Connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| PortflowError::DatabaseConnectionError(e.to_string()))?;
        Self::new(pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- users ---

    pub async fn create_user(&self, username: &str, is_staff: bool) -> Result<i64, PortflowError> {
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO users (username, is_staff) VALUES ($1, $2) RETURNING id")
                .bind(username)
                .bind(is_staff)
                .fetch_one(&self.pool)
                .await?;
        Ok(id)
    }

    pub async fn username(&self, user_id: i64) -> Result<String, PortflowError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(name,)| name).ok_or(PortflowError::NotFound)
    }

    pub async fn is_staff(&self, user_id: i64) -> Result<bool, PortflowError> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT is_staff FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(staff,)| staff).ok_or(PortflowError::NotFound)
    }

    // --- ports ---

    pub async fn create_port(
        &self,
        name: &str,
        country: &str,
        city: &str,
        code: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Port, PortflowError> {
        let port = sqlx::query_as::<_, Port>(
            "INSERT INTO ports (name, country, city, code, latitude, longitude)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(name)
        .bind(country)
        .bind(city)
        .bind(code)
        .bind(latitude)
        .bind(longitude)
        .fetch_one(&self.pool)
        .await?;
        Ok(port)
    }

    pub async fn all_ports(&self) -> Result<Vec<Port>, PortflowError> {
        Ok(sqlx::query_as::<_, Port>("SELECT * FROM ports ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn port_by_id(&self, port_id: i64) -> Result<Port, PortflowError> {
        sqlx::query_as::<_, Port>("SELECT * FROM ports WHERE id = $1")
            .bind(port_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PortflowError::NotFound)
    }

    // --- ships ---

    pub async fn ship_by_imo(&self, imo: &Imo) -> Result<Option<Ship>, PortflowError> {
        Ok(sqlx::query_as::<_, Ship>("SELECT * FROM ships WHERE imo = $1")
            .bind(imo)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn all_ships(&self) -> Result<Vec<Ship>, PortflowError> {
        Ok(sqlx::query_as::<_, Ship>("SELECT * FROM ships ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    /// Create or refresh a ship row from a provider position report
    pub async fn upsert_ship(&self, position: &VesselPosition) -> Result<Ship, PortflowError> {
        let ship = sqlx::query_as::<_, Ship>(
            "INSERT INTO ships (name, imo, ship_type, current_latitude, current_longitude,
                                current_speed, current_heading, status, destination_name,
                                expected_arrival, last_updated)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
             ON CONFLICT (imo) DO UPDATE SET
                 name = EXCLUDED.name,
                 current_latitude = EXCLUDED.current_latitude,
                 current_longitude = EXCLUDED.current_longitude,
                 current_speed = EXCLUDED.current_speed,
                 current_heading = EXCLUDED.current_heading,
                 status = EXCLUDED.status,
                 destination_name = EXCLUDED.destination_name,
                 expected_arrival = EXCLUDED.expected_arrival,
                 last_updated = now()
             RETURNING *",
        )
        .bind(&position.name)
        .bind(&position.imo)
        .bind(position.ship_type)
        .bind(position.latitude)
        .bind(position.longitude)
        .bind(position.speed)
        .bind(position.heading)
        .bind(&position.status)
        .bind(&position.destination_name)
        .bind(position.eta)
        .fetch_one(&self.pool)
        .await?;
        Ok(ship)
    }

    /// Ships past their expected arrival with a destination port set and at
    /// least one tracking user
    pub async fn delayed_tracked_ships(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ship>, PortflowError> {
        Ok(sqlx::query_as::<_, Ship>(
            "SELECT s.* FROM ships s
             WHERE s.expected_arrival < $1
               AND s.destination_port_id IS NOT NULL
               AND EXISTS (SELECT 1 FROM ship_trackers t WHERE t.ship_id = s.id)
             ORDER BY s.id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Ships with known coordinates inside a bounding box
    pub async fn ships_in_box(
        &self,
        latitude: f64,
        longitude: f64,
        range_degrees: f64,
    ) -> Result<Vec<Ship>, PortflowError> {
        Ok(sqlx::query_as::<_, Ship>(
            "SELECT * FROM ships
             WHERE current_latitude IS NOT NULL
               AND current_longitude IS NOT NULL
               AND current_latitude BETWEEN $1 AND $2
               AND current_longitude BETWEEN $3 AND $4
             ORDER BY id",
        )
        .bind(latitude - range_degrees)
        .bind(latitude + range_degrees)
        .bind(longitude - range_degrees)
        .bind(longitude + range_degrees)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn set_destination_port(
        &self,
        ship_id: i64,
        port_id: Option<i64>,
    ) -> Result<(), PortflowError> {
        sqlx::query("UPDATE ships SET destination_port_id = $2 WHERE id = $1")
            .bind(ship_id)
            .bind(port_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_expected_arrival(
        &self,
        ship_id: i64,
        expected_arrival: Option<DateTime<Utc>>,
    ) -> Result<(), PortflowError> {
        sqlx::query("UPDATE ships SET expected_arrival = $2 WHERE id = $1")
            .bind(ship_id)
            .bind(expected_arrival)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- tracking ---

    pub async fn add_tracker(&self, ship_id: i64, user_id: i64) -> Result<(), PortflowError> {
        sqlx::query(
            "INSERT INTO ship_trackers (ship_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(ship_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_tracker(&self, ship_id: i64, user_id: i64) -> Result<(), PortflowError> {
        sqlx::query("DELETE FROM ship_trackers WHERE ship_id = $1 AND user_id = $2")
            .bind(ship_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// User ids tracking a ship
    pub async fn trackers_of(&self, ship_id: i64) -> Result<Vec<i64>, PortflowError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM ship_trackers WHERE ship_id = $1 ORDER BY user_id")
                .bind(ship_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // --- weather ---

    pub async fn insert_reading(
        &self,
        port_id: i64,
        observation: &WeatherObservation,
    ) -> Result<WeatherReading, PortflowError> {
        let reading = sqlx::query_as::<_, WeatherReading>(
            "INSERT INTO weather_readings (port_id, temperature, humidity, wind_speed,
                                           wind_direction, condition, description, visibility)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(port_id)
        .bind(observation.temperature)
        .bind(observation.humidity)
        .bind(observation.wind_speed)
        .bind(observation.wind_direction)
        .bind(&observation.condition)
        .bind(&observation.description)
        .bind(observation.visibility)
        .fetch_one(&self.pool)
        .await?;
        Ok(reading)
    }

    pub async fn insert_alert(
        &self,
        port_id: i64,
        candidate: &AlertCandidate,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<WeatherAlert, PortflowError> {
        let alert = sqlx::query_as::<_, WeatherAlert>(
            "INSERT INTO weather_alerts (port_id, alert_type, severity, message,
                                         start_time, end_time, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE)
             RETURNING *",
        )
        .bind(port_id)
        .bind(candidate.alert_type)
        .bind(candidate.severity)
        .bind(&candidate.message)
        .bind(start_time)
        .bind(end_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(alert)
    }

    pub async fn active_alerts(&self) -> Result<Vec<WeatherAlert>, PortflowError> {
        Ok(sqlx::query_as::<_, WeatherAlert>(
            "SELECT * FROM weather_alerts WHERE is_active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    // --- notifications ---

    pub async fn create_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Notification, PortflowError> {
        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, title, message, notification_type, severity,
                                        is_actionable, expires_at, related_ship_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.notification_type)
        .bind(new.severity)
        .bind(new.is_actionable)
        .bind(new.expires_at)
        .bind(new.related_ship_id)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(notification)
    }

    /// Whether a notification of the same (user, type, ship) triple exists
    /// with `created_at >= since`
    pub async fn has_recent_notification(
        &self,
        user_id: i64,
        notification_type: NotificationType,
        related_ship_id: i64,
        since: DateTime<Utc>,
    ) -> Result<bool, PortflowError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM notifications
                 WHERE user_id = $1
                    AND notification_type = $2
                    AND related_ship_id = $3
                    AND created_at >= $4
             )",
        )
        .bind(user_id)
        .bind(notification_type)
        .bind(related_ship_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn notifications_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Notification>, PortflowError> {
        Ok(sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Flip a notification to read. NotFound unless the notification exists
    /// and belongs to the given user.
    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Notification, PortflowError> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications
             SET is_read = TRUE,
                 read_at = COALESCE(read_at, now())
             WHERE id = $1 AND user_id = $2
             RETURNING *",
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PortflowError::NotFound)
    }

    pub async fn unread_notification_count(&self, user_id: i64) -> Result<i64, PortflowError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // --- messages ---

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_message(
        &self,
        from_user_id: i64,
        to_user_id: i64,
        subject: &str,
        content: &str,
        message_type: MessageType,
        is_urgent: bool,
        related_ship_id: Option<i64>,
        parent_message_id: Option<i64>,
    ) -> Result<Message, PortflowError> {
        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (from_user_id, to_user_id, subject, content, message_type,
                                   is_urgent, related_ship_id, parent_message_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .bind(subject)
        .bind(content)
        .bind(message_type)
        .bind(is_urgent)
        .bind(related_ship_id)
        .bind(parent_message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    pub async fn message_by_id(&self, message_id: i64) -> Result<Message, PortflowError> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PortflowError::NotFound)
    }

    pub async fn inbox(&self, user_id: i64) -> Result<Vec<Message>, PortflowError> {
        Ok(sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE to_user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Flip a message to read, reporting whether this call made the
    /// transition.
    ///
    /// `read_at` equals `now()` only when this statement set it, so the
    /// flag is true exactly once even under concurrent readers.
    pub async fn mark_message_read(
        &self,
        message_id: i64,
        user_id: i64,
    ) -> Result<(Message, bool), PortflowError> {
        let row = sqlx::query(
            "UPDATE messages
             SET is_read = TRUE,
                 read_at = COALESCE(read_at, now())
             WHERE id = $1 AND to_user_id = $2
             RETURNING *, (read_at = now()) AS first_read",
        )
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PortflowError::NotFound)?;

        let first_read: bool = row.try_get("first_read")?;
        let message = Message::from_row(&row)?;
        Ok((message, first_read))
    }

    pub async fn unread_message_count(&self, user_id: i64) -> Result<i64, PortflowError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE to_user_id = $1 AND NOT is_read")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // --- scoring ---

    pub async fn insert_activity(
        &self,
        user_id: i64,
        activity_type: &str,
        points: i32,
    ) -> Result<PointActivity, PortflowError> {
        let activity = sqlx::query_as::<_, PointActivity>(
            "INSERT INTO point_activities (user_id, activity_type, points)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(user_id)
        .bind(activity_type)
        .bind(points)
        .fetch_one(&self.pool)
        .await?;
        Ok(activity)
    }

    /// Atomically add `points` to the user's running total.
    ///
    /// A single upsert-increment statement so concurrent activity creation
    /// for the same user cannot lose updates.
    pub async fn increment_score(
        &self,
        user_id: i64,
        points: i32,
    ) -> Result<UserScore, PortflowError> {
        let score = sqlx::query_as::<_, UserScore>(
            "INSERT INTO user_scores (user_id, total_points)
             VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE
                 SET total_points = user_scores.total_points + EXCLUDED.total_points
             RETURNING *",
        )
        .bind(user_id)
        .bind(points as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(score)
    }

    /// Record the level derived from a known total. No-op if the total has
    /// moved on since it was read, so a stale writer cannot clobber a newer
    /// level.
    pub async fn set_level(
        &self,
        user_id: i64,
        level: &str,
        at_total: i64,
    ) -> Result<(), PortflowError> {
        sqlx::query(
            "UPDATE user_scores SET level = $2 WHERE user_id = $1 AND total_points = $3",
        )
        .bind(user_id)
        .bind(level)
        .bind(at_total)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn score_for(&self, user_id: i64) -> Result<Option<UserScore>, PortflowError> {
        Ok(
            sqlx::query_as::<_, UserScore>("SELECT * FROM user_scores WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Attach the relay outcome to an activity row
    pub async fn set_activity_relay(
        &self,
        activity_id: i64,
        status: Option<&str>,
        tx_id: Option<&str>,
    ) -> Result<(), PortflowError> {
        sqlx::query("UPDATE point_activities SET hcs_status = $2, hcs_tx_id = $3 WHERE id = $1")
            .bind(activity_id)
            .bind(status)
            .bind(tx_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn activity_by_id(&self, activity_id: i64) -> Result<PointActivity, PortflowError> {
        sqlx::query_as::<_, PointActivity>("SELECT * FROM point_activities WHERE id = $1")
            .bind(activity_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PortflowError::NotFound)
    }
}

//! Scoring side-effect integration tests.
//!
//! The relay in these tests points at an address nothing listens on, so
//! every publish takes the swallowed-failure path.

use std::time::Duration;

use sqlx::PgPool;

use portflow::{config::RelayConfig, database::Database, relay::LedgerRelay, scoring::ScoreKeeper};

fn dead_relay() -> LedgerRelay {
    LedgerRelay::new(RelayConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        topic_id: Some("0.0.1234".to_string()),
        timeout: Duration::from_millis(200),
    })
    .unwrap()
}

#[sqlx::test]
async fn activities_accumulate_into_the_score(pool: PgPool) {
    let db = Database::new(pool).await.unwrap();
    let keeper = ScoreKeeper::new(db.clone(), dead_relay());
    let user = db.create_user("amina", false).await.unwrap();

    keeper.record_activity(user, "prediction", 10).await.unwrap();
    keeper.record_activity(user, "prediction", 25).await.unwrap();
    keeper.record_activity(user, "correction", -5).await.unwrap();

    let score = db.score_for(user).await.unwrap().unwrap();
    assert_eq!(score.total_points, 30);
    assert_eq!(score.level, "Novice");
}

#[sqlx::test]
async fn concurrent_activities_lose_no_updates(pool: PgPool) {
    let db = Database::new(pool).await.unwrap();
    let keeper = ScoreKeeper::new(db.clone(), dead_relay());
    let user = db.create_user("amina", false).await.unwrap();

    let (a, b, c) = tokio::join!(
        keeper.record_activity(user, "prediction", 10),
        keeper.record_activity(user, "prediction", 25),
        keeper.record_activity(user, "correction", -5),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let score = db.score_for(user).await.unwrap().unwrap();
    assert_eq!(score.total_points, 30);
}

#[sqlx::test]
async fn level_tracks_the_breakpoints(pool: PgPool) {
    let db = Database::new(pool).await.unwrap();
    let keeper = ScoreKeeper::new(db.clone(), dead_relay());
    let user = db.create_user("amina", false).await.unwrap();

    keeper.record_activity(user, "prediction", 120).await.unwrap();
    assert_eq!(db.score_for(user).await.unwrap().unwrap().level, "Intermediate");

    keeper.record_activity(user, "prediction", 400).await.unwrap();
    assert_eq!(db.score_for(user).await.unwrap().unwrap().level, "Expert");

    keeper.record_activity(user, "prediction", 600).await.unwrap();
    assert_eq!(db.score_for(user).await.unwrap().unwrap().level, "Master");
}

#[sqlx::test]
async fn relay_failure_leaves_activity_fields_empty(pool: PgPool) {
    let db = Database::new(pool).await.unwrap();
    let keeper = ScoreKeeper::new(db.clone(), dead_relay());
    let user = db.create_user("amina", false).await.unwrap();

    let activity = keeper.record_activity(user, "prediction", 10).await.unwrap();
    assert!(activity.hcs_status.is_none());
    assert!(activity.hcs_tx_id.is_none());

    // The primary write survived the relay failure
    let stored = db.activity_by_id(activity.id).await.unwrap();
    assert_eq!(stored.points, 10);
    assert!(stored.hcs_status.is_none());
    assert_eq!(db.score_for(user).await.unwrap().unwrap().total_points, 10);
}

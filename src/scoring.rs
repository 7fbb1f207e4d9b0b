//! Point activity scoring.
//!
//! Creating an activity updates the user's running score, recomputes the
//! tier label, and then hands a summary to the notarization relay. The
//! relay step is best-effort: its failure leaves the relay fields empty
//! and never unwinds the score update.

use serde_json::json;
use tracing::{error, info};

use crate::{database::Database, errors::PortflowError, models::PointActivity, relay::LedgerRelay};

/// Tier label for a point total
pub fn level_for(total_points: i64) -> &'static str {
    if total_points >= 1000 {
        "Master"
    } else if total_points >= 500 {
        "Expert"
    } else if total_points >= 100 {
        "Intermediate"
    } else {
        "Novice"
    }
}

pub struct ScoreKeeper {
    db: Database,
    relay: LedgerRelay,
}

impl ScoreKeeper {
    pub fn new(db: Database, relay: LedgerRelay) -> Self {
        Self { db, relay }
    }

    /// Record a point-earning activity.
    ///
    /// The ledger row and the score increment are the primary effects and
    /// must succeed; the relay publish happens afterwards, outside any
    /// transaction, and its outcome is only recorded on the activity row
    /// when it succeeds.
    pub async fn record_activity(
        &self,
        user_id: i64,
        activity_type: &str,
        points: i32,
    ) -> Result<PointActivity, PortflowError> {
        let mut activity = self.db.insert_activity(user_id, activity_type, points).await?;
        let score = self.db.increment_score(user_id, points).await?;

        let level = level_for(score.total_points);
        self.db.set_level(user_id, level, score.total_points).await?;

        info!(
            user_id,
            points,
            total = score.total_points,
            level,
            "Recorded point activity"
        );

        let username = self.db.username(user_id).await?;
        let payload = json!({
            "type": "POINT_ACTIVITY",
            "user": username,
            "activity": activity.activity_type,
            "points": activity.points,
            "total_points": score.total_points,
            "level": level,
            "timestamp": activity.timestamp,
        });

        let outcome = self.relay.publish(&payload).await;
        if outcome.ok {
            if let Err(e) = self
                .db
                .set_activity_relay(
                    activity.id,
                    outcome.status.as_deref(),
                    outcome.tx_id.as_deref(),
                )
                .await
            {
                error!(activity_id = activity.id, "Could not store relay outcome: {e}");
            } else {
                activity.hcs_status = outcome.status;
                activity.hcs_tx_id = outcome.tx_id;
            }
        }

        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_breakpoints() {
        assert_eq!(level_for(0), "Novice");
        assert_eq!(level_for(99), "Novice");
        assert_eq!(level_for(100), "Intermediate");
        assert_eq!(level_for(499), "Intermediate");
        assert_eq!(level_for(500), "Expert");
        assert_eq!(level_for(999), "Expert");
        assert_eq!(level_for(1000), "Master");
        assert_eq!(level_for(25_000), "Master");
    }

    #[test]
    fn negative_totals_stay_at_base_tier() {
        assert_eq!(level_for(-50), "Novice");
    }
}

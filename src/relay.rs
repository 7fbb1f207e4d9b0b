//! Ledger notarization relay client.
//!
//! Publishes a SHA-256 digest of a payload (plus the payload itself) to the
//! external HCS relay service. Publishing is fire-and-forget from the
//! caller's perspective: every failure mode is folded into a non-ok
//! [`RelayOutcome`], never an `Err`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{config::RelayConfig, errors::PortflowError};

/// Result of a publish attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayOutcome {
    pub ok: bool,
    pub tx_id: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
}

impl RelayOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    ok: bool,
    #[serde(rename = "txId")]
    tx_id: Option<String>,
    status: Option<String>,
    error: Option<String>,
}

/// SHA-256 hex digest over the canonical compact JSON serialization
pub fn payload_digest(payload: &serde_json::Value) -> Result<String, PortflowError> {
    // serde_json emits compact, whitespace-free JSON by default
    let canonical = serde_json::to_vec(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct LedgerRelay {
    config: RelayConfig,
    client: reqwest::Client,
}

impl LedgerRelay {
    pub fn new(config: RelayConfig) -> Result<Self, PortflowError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// Publish a payload to the configured topic.
    ///
    /// Attaches the payload digest and a timestamp before transmission.
    /// A missing topic id, transport failure, or non-ok upstream response
    /// all come back as a non-ok outcome.
    pub async fn publish(&self, payload: &serde_json::Value) -> RelayOutcome {
        let Some(topic_id) = self.config.topic_id.as_deref() else {
            return RelayOutcome::failed("relay topic_id is not configured");
        };

        let hash = match payload_digest(payload) {
            Ok(hash) => hash,
            Err(e) => return RelayOutcome::failed(format!("digest failed: {e}")),
        };

        let body = json!({
            "topicId": topic_id,
            "message": {
                "type": "PORTFLOW_PREDICTION",
                "hash": hash,
                "ts": Utc::now(),
                "data": payload,
            },
        });

        let url = format!("{}/hcs/publish", self.config.base_url);
        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Relay publish failed: {e}");
                return RelayOutcome::failed(format!("publish failed: {e}"));
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                warn!("Relay rejected publish: {e}");
                return RelayOutcome::failed(format!("publish failed: {e}"));
            }
        };

        match response.json::<RelayResponse>().await {
            Ok(parsed) => {
                if parsed.ok {
                    info!(tx_id = ?parsed.tx_id, "Relay publish accepted");
                } else {
                    warn!(error = ?parsed.error, "Relay reported failure");
                }
                RelayOutcome {
                    ok: parsed.ok,
                    tx_id: parsed.tx_id,
                    status: parsed.status,
                    error: parsed.error,
                }
            }
            Err(e) => {
                warn!("Relay response unreadable: {e}");
                RelayOutcome::failed(format!("unreadable response: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn digest_is_stable_and_whitespace_free() {
        let payload = json!({"user": "amina", "points": 25});
        let first = payload_digest(&payload).unwrap();
        let second = payload_digest(&payload).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_changes_with_payload() {
        let a = payload_digest(&json!({"points": 25})).unwrap();
        let b = payload_digest(&json!({"points": 26})).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn publish_without_topic_is_a_non_ok_outcome() {
        let relay = LedgerRelay::new(RelayConfig {
            base_url: "http://127.0.0.1:8787".to_string(),
            topic_id: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let outcome = relay.publish(&json!({"type": "POINT_ACTIVITY"})).await;
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("topic_id"));
        assert!(outcome.tx_id.is_none());
    }

    #[tokio::test]
    async fn publish_against_unreachable_relay_is_swallowed() {
        // Port 9 is discard; nothing listens there in test environments.
        let relay = LedgerRelay::new(RelayConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            topic_id: Some("0.0.1234".to_string()),
            timeout: Duration::from_millis(200),
        })
        .unwrap();

        let outcome = relay.publish(&json!({"type": "POINT_ACTIVITY"})).await;
        assert!(!outcome.ok);
        assert!(outcome.error.is_some());
    }
}

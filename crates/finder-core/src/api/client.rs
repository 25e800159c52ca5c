//! Resolver client for the FIND fingerprint-to-location service.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{BadgeId, Reading};
use crate::utils::format_mac;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// A hung resolver call delays the whole submission queue, so fail well before the next scan round.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Prefix for resolver usernames; the resolver tracks each badge as its own user
const USERNAME_PREFIX: &str = "swadge_";

const TRACK_PATH: &str = "/track";
const LEARN_PATH: &str = "/learn";

/// Request body shared by track and learn submissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub username: String,
    pub group: String,
    /// Scan time in milliseconds since the epoch
    pub time: i64,
    #[serde(rename = "wifi-fingerprint")]
    pub wifi_fingerprint: Vec<Reading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Submission {
    pub fn new(badge: BadgeId, group: &str, scanned_at: DateTime<Utc>, readings: Vec<Reading>) -> Self {
        let wifi_fingerprint = readings
            .into_iter()
            .map(|r| Reading::new(format_mac(&r.mac), r.rssi))
            .collect();

        Self {
            username: format!("{}{}", USERNAME_PREFIX, badge),
            group: group.to_string(),
            time: scanned_at.timestamp_millis(),
            wifi_fingerprint,
            location: None,
        }
    }

    /// Turn this into a learn submission for the given ground-truth location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackResponse {
    #[serde(default)]
    pub location: Option<String>,
}

/// Location resolver used by the submission worker
pub trait Resolver: Send + Sync + 'static {
    fn track(
        &self,
        submission: &Submission,
    ) -> impl Future<Output = Result<TrackResponse, ApiError>> + Send;

    fn learn(&self, submission: &Submission) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// HTTP resolver client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ResolverClient {
    client: Client,
    base_url: String,
}

impl ResolverClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, path: &str, body: &Submission) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        debug!(url = %url, user = %body.username, readings = body.wifi_fingerprint.len(), "Submitting fingerprint");

        let response = self.client.post(&url).json(body).send().await?;
        Self::check_response(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Submission) -> Result<T, ApiError> {
        let response = self.send(path, body).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}: {}", e, path, text)))
    }
}

impl Resolver for ResolverClient {
    async fn track(&self, submission: &Submission) -> Result<TrackResponse, ApiError> {
        self.post(TRACK_PATH, submission).await
    }

    async fn learn(&self, submission: &Submission) -> Result<(), ApiError> {
        self.send(LEARN_PATH, submission).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_submission_wire_format() {
        let scanned_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let submission = Submission::new(
            BadgeId(42),
            "hackafe",
            scanned_at,
            vec![Reading::new("aabbcc001122", -40), Reading::new("aa:bb:cc:00:11:23", -55)],
        );

        let json = serde_json::to_value(&submission).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "username": "swadge_42",
                "group": "hackafe",
                "time": 1_700_000_000_123i64,
                "wifi-fingerprint": [
                    {"mac": "AA:BB:CC:00:11:22", "rssi": -40},
                    {"mac": "AA:BB:CC:00:11:23", "rssi": -55}
                ]
            })
        );
    }

    #[test]
    fn test_learn_submission_carries_location() {
        let submission = Submission::new(BadgeId(1), "hackafe", Utc::now(), vec![])
            .with_location("lego_room");
        let json = serde_json::to_value(&submission).expect("serialize");
        assert_eq!(json["location"], "lego_room");
    }

    #[test]
    fn test_parse_track_response() {
        let resp: TrackResponse = serde_json::from_str(r#"{"success":true,"location":"panels1"}"#)
            .expect("Failed to parse track response");
        assert_eq!(resp.location.as_deref(), Some("panels1"));

        let resp: TrackResponse = serde_json::from_str(r#"{"success":false}"#)
            .expect("Failed to parse track response without location");
        assert!(resp.location.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ResolverClient::new("http://find.example/").expect("client");
        assert_eq!(client.url(TRACK_PATH), "http://find.example/track");
    }
}

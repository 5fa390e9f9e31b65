//! Types for separation server requests and responses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stem_playback::{SessionToken, TrackId, TrackSet};

/// Configuration for connecting to a separation server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server (e.g., "http://localhost:7860")
    pub url: String,
    /// Whole-request timeout; separation of a full song is slow (default: 600)
    pub timeout_secs: u64,
    /// Connection timeout (default: 10)
    pub connect_timeout_secs: u64,
}

impl ServerConfig {
    /// Create a new server config with default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7860".to_string(),
            timeout_secs: 600,
            connect_timeout_secs: 10,
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Response from `POST /api/separate`.
#[derive(Debug, Deserialize)]
pub(crate) struct SeparateResponse {
    pub success: bool,
    #[serde(default)]
    pub tracks: HashMap<String, String>,
    pub session_id: Option<String>,
}

/// Response from `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub active_sessions: u64,
}

/// Response from `POST /api/cleanup/{session_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Results
// =============================================================================

/// Stems produced by one separation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparationResult {
    /// Server session holding the stems until cleanup
    pub session_id: SessionToken,
    /// Absolute download URL per stem, in display order
    pub tracks: Vec<(TrackId, String)>,
}

impl SeparationResult {
    /// Track set pointing at the remote stems
    pub fn track_set(&self) -> TrackSet {
        self.tracks
            .iter()
            .cloned()
            .collect::<TrackSet>()
            .with_session_token(self.session_id.clone())
    }

    pub fn url(&self, track: TrackId) -> Option<&str> {
        self.tracks
            .iter()
            .find(|(id, _)| *id == track)
            .map(|(_, url)| url.as_str())
    }
}

/// Download progress information.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub track: TrackId,
    pub bytes_received: u64,
    pub bytes_total: Option<u64>,
    /// Progress as a fraction (0.0 - 1.0), 0 when the size is unknown
    pub progress: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.url, "http://localhost:7860");
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn result_builds_track_set_with_token() {
        let result = SeparationResult {
            session_id: SessionToken::new("abc"),
            tracks: vec![
                (TrackId::Vocals, "http://h/api/download/abc/vocals".to_string()),
                (TrackId::Drums, "http://h/api/download/abc/drums".to_string()),
            ],
        };

        let set = result.track_set();
        assert_eq!(set.len(), 2);
        assert_eq!(set.session_token(), Some(&SessionToken::new("abc")));
        assert_eq!(
            set.locator(TrackId::Drums),
            Some("http://h/api/download/abc/drums")
        );
        assert_eq!(result.url(TrackId::Bass), None);
    }

    #[test]
    fn health_parses_server_body() {
        let body = r#"{"status":"healthy","message":"Audio separation service is running","active_sessions":2}"#;
        let health: HealthResponse = serde_json::from_str(body).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_sessions, 2);
    }
}

//! Main separation server client.

use crate::download::DownloadClient;
use crate::error::{Result, ServerClientError};
use crate::separate::SeparationClient;
use crate::types::{CleanupResponse, DownloadProgress, HealthResponse, SeparationResult, ServerConfig};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use stem_playback::{SessionToken, TrackSet};
use tracing::{debug, info, warn};

/// Client for a stem separation server.
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Example
///
/// ```ignore
/// use stem_server_client::{ServerConfig, StemServerClient};
///
/// let client = StemServerClient::new(ServerConfig::new("http://localhost:7860"))?;
/// let health = client.health().await?;
/// println!("{} ({} active sessions)", health.status, health.active_sessions);
///
/// let result = client.separate(Path::new("song.mp3")).await?;
/// for (track, url) in &result.tracks {
///     println!("{track}: {url}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StemServerClient {
    http: Client,
    base_url: String,
}

impl StemServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let base_url = config.url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(format!("StemPlayer/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ServerClientError::Request)?;

        Ok(Self { http, base_url })
    }

    /// Get the normalized server URL.
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Check that the server is up.
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/api/health", self.base_url);
        debug!(url = %url, "Checking server health");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        if !response.status().is_success() {
            return Err(ServerClientError::from_response(response).await);
        }

        let health: HealthResponse = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse health response: {}", e))
        })?;

        info!(
            status = %health.status,
            active_sessions = health.active_sessions,
            "Server reachable"
        );

        Ok(health)
    }

    /// Upload a song and return its stems.
    pub async fn separate(&self, file_path: &Path) -> Result<SeparationResult> {
        self.separation().separate(file_path).await
    }

    /// Ask the server to delete a session's stems.
    pub async fn cleanup(&self, session: &SessionToken) -> Result<CleanupResponse> {
        let url = format!("{}/api/cleanup/{}", self.base_url, session);
        debug!(url = %url, session = %session, "Cleaning up session");

        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        if !response.status().is_success() {
            return Err(ServerClientError::from_response(response).await);
        }

        let body: CleanupResponse = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse cleanup response: {}", e))
        })?;

        info!(session = %session, message = %body.message, "Session cleaned up");
        Ok(body)
    }

    /// Download every stem of a separation into `out_dir`.
    pub async fn download_stems<F>(
        &self,
        result: &SeparationResult,
        original_file: &Path,
        out_dir: &Path,
        progress_callback: F,
    ) -> Result<TrackSet>
    where
        F: FnMut(DownloadProgress),
    {
        self.downloads()
            .download_stems(result, original_file, out_dir, progress_callback)
            .await
    }

    /// Download every stem, releasing the server session if any download fails.
    ///
    /// The download error is returned either way; a failed cleanup is only
    /// logged.
    pub async fn download_stems_or_cleanup<F>(
        &self,
        result: &SeparationResult,
        original_file: &Path,
        out_dir: &Path,
        progress_callback: F,
    ) -> Result<TrackSet>
    where
        F: FnMut(DownloadProgress),
    {
        match self
            .download_stems(result, original_file, out_dir, progress_callback)
            .await
        {
            Ok(tracks) => Ok(tracks),
            Err(e) => {
                if let Err(cleanup_error) = self.cleanup(&result.session_id).await {
                    warn!(
                        session = %result.session_id,
                        error = %cleanup_error,
                        "Failed to clean up session after download error"
                    );
                }
                Err(e)
            }
        }
    }

    /// Separation operations.
    pub fn separation(&self) -> SeparationClient<'_> {
        SeparationClient::new(&self.http, &self.base_url)
    }

    /// Download operations.
    pub fn downloads(&self) -> DownloadClient<'_> {
        DownloadClient::new(&self.http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_url() {
        let result = StemServerClient::new(ServerConfig::new(""));
        assert!(matches!(result, Err(ServerClientError::InvalidUrl(_))));
    }

    #[test]
    fn rejects_non_http_url() {
        let result = StemServerClient::new(ServerConfig::new("ftp://example.com"));
        assert!(matches!(result, Err(ServerClientError::InvalidUrl(_))));
    }

    #[test]
    fn trims_trailing_slash() {
        let client = StemServerClient::new(ServerConfig::new("http://localhost:7860/")).unwrap();
        assert_eq!(client.url(), "http://localhost:7860");
    }
}

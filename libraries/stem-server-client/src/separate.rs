//! Song upload and separation.

use crate::error::{Result, ServerClientError};
use crate::types::{SeparateResponse, SeparationResult};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::path::Path;
use stem_playback::{SessionToken, TrackId};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Extensions the separation server accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["mp3", "wav", "flac", "ogg", "m4a", "aac"];

/// Separation client for the stem server.
pub struct SeparationClient<'a> {
    http: &'a Client,
    base_url: &'a str,
}

impl<'a> SeparationClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str) -> Self {
        Self { http, base_url }
    }

    /// Upload a song and wait for its stems.
    ///
    /// Files the server would reject are refused before uploading. Stem
    /// locators in the response are resolved against the server URL.
    pub async fn separate(&self, file_path: &Path) -> Result<SeparationResult> {
        if !file_path.exists() {
            return Err(ServerClientError::FileNotFound(
                file_path.display().to_string(),
            ));
        }
        if !is_supported_audio(file_path) {
            let ext = file_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            return Err(ServerClientError::UnsupportedFileType(ext));
        }

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        debug!(file = %file_path.display(), "Uploading song for separation");

        // Read file contents
        let mut file = File::open(file_path).await?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;
        let file_size = contents.len();

        let audio_part = Part::bytes(contents)
            .file_name(file_name.clone())
            .mime_str(mime_type_for_file(file_path))?;
        let form = Form::new().part("audio", audio_part);

        let url = format!("{}/api/separate", self.base_url);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerClientError::from_response(response).await);
        }

        let body: SeparateResponse = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse separation response: {}", e))
        })?;

        if !body.success {
            return Err(ServerClientError::ServerError {
                status: status.as_u16(),
                message: "separation failed".to_string(),
            });
        }
        let session_id = body
            .session_id
            .ok_or_else(|| ServerClientError::ParseError("missing session_id".into()))?;

        let mut tracks: Vec<(TrackId, String)> = body
            .tracks
            .into_iter()
            .filter_map(|(name, locator)| match name.parse::<TrackId>() {
                Ok(id) => Some((id, resolve_url(self.base_url, &locator))),
                Err(e) => {
                    warn!(error = %e, "Ignoring unknown stem in response");
                    None
                }
            })
            .collect();
        tracks.sort_by_key(|(id, _)| *id);

        if tracks.is_empty() {
            return Err(ServerClientError::ParseError(
                "no stems in separation response".into(),
            ));
        }

        info!(
            session = %session_id,
            file = %file_name,
            size = file_size,
            stems = tracks.len(),
            "Song separated"
        );

        Ok(SeparationResult {
            session_id: SessionToken::new(session_id),
            tracks,
        })
    }
}

/// Whether the server accepts this file, judged by extension.
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Get MIME type for audio file.
fn mime_type_for_file(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("m4a" | "aac") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Make a server-relative locator absolute
pub(crate) fn resolve_url(base_url: &str, locator: &str) -> String {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        locator.to_string()
    } else if locator.starts_with('/') {
        format!("{}{}", base_url, locator)
    } else {
        format!("{}/{}", base_url, locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for_file(Path::new("song.mp3")), "audio/mpeg");
        assert_eq!(mime_type_for_file(Path::new("song.FLAC")), "audio/flac");
        assert_eq!(mime_type_for_file(Path::new("song.m4a")), "audio/mp4");
        assert_eq!(
            mime_type_for_file(Path::new("song.unknown")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_audio(Path::new("a/song.mp3")));
        assert!(is_supported_audio(Path::new("song.WAV")));
        assert!(is_supported_audio(Path::new("song.aac")));
        assert!(!is_supported_audio(Path::new("song.opus")));
        assert!(!is_supported_audio(Path::new("song")));
    }

    #[test]
    fn test_resolve_url() {
        let base = "http://localhost:7860";
        assert_eq!(
            resolve_url(base, "/api/download/s1/vocals"),
            "http://localhost:7860/api/download/s1/vocals"
        );
        assert_eq!(
            resolve_url(base, "api/download/s1/bass"),
            "http://localhost:7860/api/download/s1/bass"
        );
        assert_eq!(
            resolve_url(base, "https://cdn.example.com/x.wav"),
            "https://cdn.example.com/x.wav"
        );
    }
}

//! Stem download operations.

use crate::error::{Result, ServerClientError};
use crate::types::{DownloadProgress, SeparationResult};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use stem_playback::{TrackId, TrackSet};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Download client for separated stems.
pub struct DownloadClient<'a> {
    http: &'a Client,
}

impl<'a> DownloadClient<'a> {
    pub(crate) fn new(http: &'a Client) -> Self {
        Self { http }
    }

    /// Download one stem to `dest_path`.
    ///
    /// Returns the response content type, if the server sent one.
    pub async fn download_track<F>(
        &self,
        track: TrackId,
        url: &str,
        dest_path: &Path,
        mut progress_callback: F,
    ) -> Result<Option<String>>
    where
        F: FnMut(DownloadProgress),
    {
        debug!(url = %url, track = %track, dest = %dest_path.display(), "Downloading stem");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        if !response.status().is_success() {
            return Err(ServerClientError::from_response(response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let total_size = response.content_length();

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest_path).await?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            let progress = total_size
                .filter(|total| *total > 0)
                .map(|total| downloaded as f32 / total as f32)
                .unwrap_or(0.0);

            progress_callback(DownloadProgress {
                track,
                bytes_received: downloaded,
                bytes_total: total_size,
                progress,
            });
        }

        file.flush().await?;

        info!(
            track = %track,
            dest = %dest_path.display(),
            size = downloaded,
            "Stem downloaded"
        );

        Ok(content_type)
    }

    /// Download every stem of a separation into `out_dir`.
    ///
    /// Files are named `{song}_{track}.{ext}` after the uploaded song. The
    /// returned track set points at the local files and keeps the session
    /// token so the server copy can still be cleaned up.
    pub async fn download_stems<F>(
        &self,
        result: &SeparationResult,
        original_file: &Path,
        out_dir: &Path,
        mut progress_callback: F,
    ) -> Result<TrackSet>
    where
        F: FnMut(DownloadProgress),
    {
        tokio::fs::create_dir_all(out_dir).await?;

        let mut set = TrackSet::new().with_session_token(result.session_id.clone());
        for (track, url) in &result.tracks {
            // Name is only known once the content type arrives
            let staging = out_dir.join(format!(".{}.{}.part", result.session_id, track));
            let content_type = self
                .download_track(*track, url, &staging, &mut progress_callback)
                .await?;

            let dest = out_dir.join(stem_file_name(
                original_file,
                *track,
                content_type.as_deref(),
            ));
            tokio::fs::rename(&staging, &dest).await?;
            set = set.with_track(*track, dest.display().to_string());
        }

        Ok(set)
    }
}

/// Local file name for a downloaded stem: `{song}_{track}.{ext}`.
pub fn stem_file_name(original: &Path, track: TrackId, content_type: Option<&str>) -> PathBuf {
    let base = original
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("song");
    PathBuf::from(format!(
        "{}_{}.{}",
        base,
        track.as_str(),
        extension_for_content_type(content_type)
    ))
}

fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("audio/mpeg" | "audio/mp3") => "mp3",
        Some("audio/flac" | "audio/x-flac") => "flac",
        Some("audio/ogg") => "ogg",
        _ => "wav",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_song_and_track() {
        let name = stem_file_name(Path::new("/music/My Song.mp3"), TrackId::Vocals, None);
        assert_eq!(name, PathBuf::from("My Song_vocals.wav"));
    }

    #[test]
    fn extension_comes_from_content_type() {
        let song = Path::new("song.flac");
        assert_eq!(
            stem_file_name(song, TrackId::Drums, Some("audio/mpeg")),
            PathBuf::from("song_drums.mp3")
        );
        assert_eq!(
            stem_file_name(song, TrackId::Bass, Some("audio/x-wav")),
            PathBuf::from("song_bass.wav")
        );
        assert_eq!(
            stem_file_name(song, TrackId::Other, Some("audio/flac; charset=binary")),
            PathBuf::from("song_other.flac")
        );
        assert_eq!(
            stem_file_name(song, TrackId::Other, Some("audio/ogg")),
            PathBuf::from("song_other.ogg")
        );
        assert_eq!(
            stem_file_name(song, TrackId::Other, Some("application/octet-stream")),
            PathBuf::from("song_other.wav")
        );
    }
}

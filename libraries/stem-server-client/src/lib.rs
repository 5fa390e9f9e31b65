//! Stem Separation Server Client
//!
//! HTTP client for the stem separation server.
//!
//! # Features
//!
//! - **Health**: check that the server is up
//! - **Separate**: upload a song, get one download URL per stem
//! - **Download**: fetch stems to local files with progress reporting
//! - **Cleanup**: delete a session's stems, directly or when playback ends
//!
//! # Example
//!
//! ```ignore
//! use stem_server_client::{ServerConfig, StemServerClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StemServerClient::new(ServerConfig::new("http://localhost:7860"))?;
//!     let result = client.separate(std::path::Path::new("song.mp3")).await?;
//!
//!     let local = client
//!         .download_stems(&result, "song.mp3".as_ref(), "stems".as_ref(), |_| {})
//!         .await?;
//!     println!("{} stems downloaded", local.len());
//!
//!     client.cleanup(&result.session_id).await?;
//!     Ok(())
//! }
//! ```

mod cleanup;
mod client;
mod download;
mod error;
mod separate;
mod types;

pub use cleanup::CleanupNotifier;
pub use client::StemServerClient;
pub use download::{stem_file_name, DownloadClient};
pub use error::{Result, ServerClientError};
pub use separate::{is_supported_audio, SeparationClient, SUPPORTED_EXTENSIONS};
pub use types::{
    CleanupResponse, DownloadProgress, HealthResponse, SeparationResult, ServerConfig,
};

/// Application configuration
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stem_audio_desktop::DesktopHostConfig;
use stem_playback::{DurationPolicy, PlaybackConfig};
use stem_server_client::ServerConfig;

const DEFAULT_CONFIG_FILE: &str = "stem-player.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Separation server base URL
    pub server_url: String,

    /// Where downloaded stems are written
    pub output_dir: PathBuf,

    /// Position report interval while playing
    pub position_interval_ms: u64,

    /// Clean up the previous server session when a new song replaces it
    pub cleanup_on_replace: bool,

    pub duration_policy: DurationPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:7860".to_string(),
            output_dir: PathBuf::from("stems"),
            position_interval_ms: DesktopHostConfig::default().position_interval_ms,
            cleanup_on_replace: true,
            duration_policy: DurationPolicy::FirstReported,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `stem-player.toml` in the
    /// working directory is read when present. `STEM_*` variables override
    /// both (e.g. `STEM_SERVER_URL`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(config::Environment::with_prefix("STEM").try_parsing(true));

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig::new(self.server_url.clone())
    }

    pub fn playback(&self) -> PlaybackConfig {
        PlaybackConfig {
            cleanup_on_replace: self.cleanup_on_replace,
            duration_policy: self.duration_policy,
        }
    }

    pub fn desktop(&self) -> DesktopHostConfig {
        DesktopHostConfig {
            position_interval_ms: self.position_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_url, "http://localhost:7860");
        assert_eq!(config.output_dir, PathBuf::from("stems"));
        assert_eq!(config.position_interval_ms, 250);
        assert!(config.playback().cleanup_on_replace);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "server_url = \"http://gpu-box:9000\"\nduration_policy = \"shortest\"\ncleanup_on_replace = false\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server_url, "http://gpu-box:9000");
        assert_eq!(config.duration_policy, DurationPolicy::Shortest);
        assert!(!config.cleanup_on_replace);
        assert_eq!(config.output_dir, PathBuf::from("stems"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}

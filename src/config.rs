//! Engine configuration
//!
//! Central location for interval constants, note defaults, settings keys
//! and the on-disk remote endpoint configuration.

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

// ===== Periodic task intervals =====

/// Seconds between sync pull/ack cycles. The fixed interval is also the
/// retry policy: a failed cycle simply waits for the next tick.
pub const SYNC_INTERVAL_SECS: u64 = 10;

/// Milliseconds between alarm due-scans.
pub const ALARM_TICK_MS: u64 = 1_000;

/// Milliseconds a queued note write may sit before the debounced flusher
/// persists it. Matches the original client's content save timer.
pub const SAVE_DEBOUNCE_MS: u64 = 400;

// ===== Note defaults =====

/// Default background color for new notes.
pub const NOTE_BACKGROUND_HEX: &str = "#FFF59A";
/// Default border theme for new notes.
pub const NOTE_BORDER_HEX: &str = "#D4B445";
pub const NOTE_DEFAULT_WIDTH: i64 = 360;
pub const NOTE_DEFAULT_HEIGHT: i64 = 300;
pub const NOTE_DEFAULT_X: i64 = 60;
pub const NOTE_DEFAULT_Y: i64 = 60;

/// Placeholder title used when a note is created or pushed with a blank one.
pub const NOTE_DEFAULT_TITLE: &str = "Note";

/// Empty-document marker. The engine treats note content as an opaque
/// string; this is only a default for blank content on create/push.
pub const NOTE_EMPTY_DOCUMENT: &str = "{\"document\":[]}";

// ===== Settings keys =====

pub const SETTING_LAST_SYNC: &str = "last_sync";
pub const SETTING_ALARM_SOUND_PATH: &str = "alarm_sound_path";
pub const SETTING_ACTIVE_GROUP_ID: &str = "active_group_id";
pub const SETTING_ACTIVE_USER_ID: &str = "active_user_id";
pub const SETTING_ACTIVE_AUTHOR_ID: &str = "active_author_id";

// ===== Alarm sounds =====

/// File names probed first in each sound folder.
pub const PREFERRED_ALARM_FILES: &[&str] = &["alarm.wav", "alarm.mp3"];

/// Extensions accepted when falling back to "any audio file in the folder".
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

// ===== Remote endpoint =====

/// Default API base URL when no settings file overrides it.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/";

/// Name of the optional JSON file overriding the API base URL.
pub const REMOTE_CONFIG_FILE: &str = "stickysync_settings.json";

/// Remote endpoint configuration loaded from `stickysync_settings.json`.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_url: String,
}

#[derive(Deserialize)]
struct RemoteConfigFile {
    api_url: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl RemoteConfig {
    /// Load the remote configuration from `dir`, falling back to the default
    /// URL when the file is missing or malformed.
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(REMOTE_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let parsed: RemoteConfigFile = match serde_json::from_str(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Malformed {}: {}, using default API URL", REMOTE_CONFIG_FILE, e);
                return Ok(Self::default());
            }
        };

        let api_url = match parsed.api_url {
            Some(url) if !url.trim().is_empty() => ensure_trailing_slash(url.trim()),
            _ => DEFAULT_API_URL.to_string(),
        };

        Ok(Self { api_url })
    }
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_default() {
        let temp = TempDir::new().unwrap();
        let config = RemoteConfig::load(temp.path()).await.unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[tokio::test]
    async fn test_trailing_slash_normalized() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(
            temp.path().join(REMOTE_CONFIG_FILE),
            r#"{"api_url":"https://notes.example.com/api"}"#,
        )
        .await
        .unwrap();

        let config = RemoteConfig::load(temp.path()).await.unwrap();
        assert_eq!(config.api_url, "https://notes.example.com/api/");
    }

    #[tokio::test]
    async fn test_malformed_file_falls_back() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join(REMOTE_CONFIG_FILE), "not json")
            .await
            .unwrap();

        let config = RemoteConfig::load(temp.path()).await.unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}

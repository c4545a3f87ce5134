//! Build/deploy-time settings.
//!
//! Loaded from the first parseable config file on the search path, then
//! overridden by `KUBEASY_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://www.kubeasy.com/api";
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Deploy-time mock flag. `None` means "not defined" and lets resolution
    /// fall through to the default tier.
    pub mock_enabled: Option<bool>,
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    /// Origin used for OAuth redirect URIs.
    pub app_origin: String,
    /// Development build profile; decides the default tier.
    pub dev_profile: bool,
    pub refresh_interval_secs: u64,
    pub simulate_latency: bool,
    /// Pause between retries of idempotent live reads.
    pub retry_backoff_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mock_enabled: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout_ms: 10_000,
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            dev_profile: cfg!(debug_assertions),
            refresh_interval_secs: 30,
            simulate_latency: true,
            retry_backoff_ms: 200,
        }
    }
}

impl Settings {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Settings for tests and embedding: no file lookup, no env, no latency.
    pub fn quiet() -> Self {
        Self {
            simulate_latency: false,
            retry_backoff_ms: 0,
            ..Self::default()
        }
    }

    /// Search the config paths, then apply environment overrides.
    pub async fn load() -> Self {
        let mut settings = load_from_paths(&config_paths()).await.unwrap_or_default();
        settings.apply_env(|key| env::var(key).ok());
        settings
    }

    /// Overlay values from an environment lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KUBEASY_MOCK_ENABLED") {
            // Same rule as the other tiers: only the literal "true" enables.
            self.mock_enabled = Some(v.trim() == "true");
        }
        if let Some(v) = lookup("KUBEASY_API_BASE_URL") {
            self.api_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("KUBEASY_API_TIMEOUT_MS") {
            match v.trim().parse() {
                Ok(ms) => self.api_timeout_ms = ms,
                Err(e) => log::warn!("ignoring KUBEASY_API_TIMEOUT_MS={:?}: {}", v, e),
            }
        }
        if let Some(v) = lookup("KUBEASY_APP_ORIGIN") {
            self.app_origin = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("KUBEASY_REFRESH_SECS") {
            match v.trim().parse() {
                Ok(secs) => self.refresh_interval_secs = secs,
                Err(e) => log::warn!("ignoring KUBEASY_REFRESH_SECS={:?}: {}", v, e),
            }
        }
        if let Some(v) = lookup("KUBEASY_SIMULATE_LATENCY") {
            self.simulate_latency = v.trim() == "true";
        }
        if let Some(v) = lookup("KUBEASY_DEV") {
            self.dev_profile = v.trim() == "true";
        }
    }
}

/// Config file search order: project, home, XDG config dir.
fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".kubeasy.json")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".kubeasy.json"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("kubeasy").join("config.json"));
    }
    paths
}

async fn load_from_paths(paths: &[PathBuf]) -> Option<Settings> {
    for path in paths {
        if !path.exists() {
            continue;
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => {
                    log::info!("loaded settings from {}", path.display());
                    return Some(settings);
                }
                Err(e) => log::warn!("failed to parse {}: {}", path.display(), e),
            },
            Err(e) => log::warn!("failed to read {}: {}", path.display(), e),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("KUBEASY_MOCK_ENABLED", "false"),
            ("KUBEASY_API_BASE_URL", "https://api.example.com/"),
            ("KUBEASY_API_TIMEOUT_MS", "2500"),
            ("KUBEASY_REFRESH_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.mock_enabled, Some(false));
        assert_eq!(settings.api_base_url, "https://api.example.com");
        assert_eq!(settings.api_timeout(), Duration::from_millis(2500));
        assert_eq!(settings.refresh_interval_secs, 30);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"mockEnabled": true}"#).unwrap();
        assert_eq!(settings.mock_enabled, Some(true));
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.api_timeout_ms, 10_000);
    }

    #[tokio::test]
    async fn test_first_parseable_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        let good = dir.path().join("good.json");
        tokio::fs::write(&broken, "{ nope").await.unwrap();
        tokio::fs::write(&good, r#"{"apiTimeoutMs": 42}"#).await.unwrap();

        let missing = dir.path().join("missing.json");
        let loaded = load_from_paths(&[missing, broken, good]).await.unwrap();
        assert_eq!(loaded.api_timeout_ms, 42);
    }
}

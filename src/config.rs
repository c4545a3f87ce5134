//! Resolution of the synthetic-backend flag.
//!
//! Precedence: `mock` query parameter > persisted store > deploy-time flag >
//! build profile default. The first tier that yields a value wins and the
//! result is memoized until [`ConfigResolver::reset`] or
//! [`ConfigResolver::set_enabled`].

use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::StorageError;
use crate::settings::Settings;
use crate::storage::KeyValueStore;

pub const MOCK_STORAGE_KEY: &str = "kubeasy-mock-enabled";
pub const MOCK_QUERY_PARAM: &str = "mock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigSource {
    UrlParam,
    PersistedStore,
    Environment,
    Default,
}

impl ConfigSource {
    pub fn describe(self) -> &'static str {
        match self {
            ConfigSource::UrlParam => "URL Parameter",
            ConfigSource::PersistedStore => "Persisted Store",
            ConfigSource::Environment => "Environment Variable",
            ConfigSource::Default => "Default (Build Profile)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigState {
    pub value: bool,
    pub source: ConfigSource,
}

/// Published whenever the mode is forced with `set_enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub enabled: bool,
    pub previous: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub enabled: bool,
    pub source: ConfigSource,
    pub url_param: Option<String>,
    pub persisted: Option<String>,
    pub env_var: Option<bool>,
    pub is_dev: bool,
}

pub struct ConfigResolver {
    env_flag: Option<bool>,
    dev_profile: bool,
    store: Arc<dyn KeyValueStore>,
    page_url: RwLock<Option<String>>,
    state: Mutex<Option<ConfigState>>,
    changes: broadcast::Sender<ModeChange>,
}

impl ConfigResolver {
    pub fn new(settings: &Settings, store: Arc<dyn KeyValueStore>, page_url: Option<String>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            env_flag: settings.mock_enabled,
            dev_profile: settings.dev_profile,
            store,
            page_url: RwLock::new(page_url),
            state: Mutex::new(None),
            changes,
        }
    }

    /// Replace the navigable context. The memoized value is kept.
    pub fn set_page_url(&self, url: Option<String>) {
        *self.page_url.write().unwrap_or_else(|e| e.into_inner()) = url;
    }

    pub fn is_synthetic_enabled(&self) -> bool {
        self.resolve().value
    }

    /// The tier that produced the active value.
    pub fn source(&self) -> ConfigSource {
        self.resolve().source
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModeChange> {
        self.changes.subscribe()
    }

    /// Force the mode, persist it and notify subscribers. The in-process
    /// value changes even if persisting fails.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        let previous = {
            let mut state = self.lock_state();
            let previous = state.map(|s| s.value);
            *state = Some(ConfigState { value: enabled, source: ConfigSource::PersistedStore });
            previous
        };
        log::info!("mock mode manually set to: {}", enabled);
        let persisted = self.store.set(MOCK_STORAGE_KEY, bool_str(enabled));
        // No receivers is fine; nothing depends on the mode yet.
        let _ = self.changes.send(ModeChange { enabled, previous });
        persisted
    }

    /// Forget the memoized value and the persisted override.
    pub fn reset(&self) -> Result<(), StorageError> {
        *self.lock_state() = None;
        log::info!("mock configuration reset");
        self.store.remove(MOCK_STORAGE_KEY)
    }

    pub fn debug_info(&self) -> DebugInfo {
        let state = self.resolve();
        DebugInfo {
            enabled: state.value,
            source: state.source,
            url_param: self.url_param(),
            persisted: self.store.get(MOCK_STORAGE_KEY),
            env_var: self.env_flag,
            is_dev: self.dev_profile,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<ConfigState>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve(&self) -> ConfigState {
        let mut state = self.lock_state();
        if let Some(resolved) = *state {
            return resolved;
        }
        let resolved = self.resolve_uncached();
        *state = Some(resolved);
        resolved
    }

    fn resolve_uncached(&self) -> ConfigState {
        if let Some(param) = self.url_param() {
            let value = param == "true";
            if let Err(e) = self.store.set(MOCK_STORAGE_KEY, bool_str(value)) {
                log::warn!("failed to persist mock flag from URL parameter: {}", e);
            }
            log::info!("mock mode set via URL parameter: {}", value);
            return ConfigState { value, source: ConfigSource::UrlParam };
        }

        if let Some(stored) = self.store.get(MOCK_STORAGE_KEY) {
            let value = stored == "true";
            log::info!("mock mode loaded from persisted store: {}", value);
            return ConfigState { value, source: ConfigSource::PersistedStore };
        }

        if let Some(value) = self.env_flag {
            log::info!("mock mode set via environment variable: {}", value);
            return ConfigState { value, source: ConfigSource::Environment };
        }

        log::info!("mock mode using default (dev={}): {}", self.dev_profile, self.dev_profile);
        ConfigState { value: self.dev_profile, source: ConfigSource::Default }
    }

    fn url_param(&self) -> Option<String> {
        let url = self.page_url.read().unwrap_or_else(|e| e.into_inner());
        url.as_deref().and_then(|u| query_param(u, MOCK_QUERY_PARAM))
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// First value of `name` in the query string of `url`, percent-decoded.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or("");

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| decode_component(key) == name)
        .map(|(_, value)| decode_component(value))
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn resolver(
        url: Option<&str>,
        persisted: Option<&str>,
        env: Option<bool>,
        dev: bool,
    ) -> (ConfigResolver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        if let Some(p) = persisted {
            store.set(MOCK_STORAGE_KEY, p).unwrap();
        }
        let settings = Settings { mock_enabled: env, dev_profile: dev, ..Settings::quiet() };
        let resolver = ConfigResolver::new(&settings, store.clone(), url.map(String::from));
        (resolver, store)
    }

    #[test]
    fn test_query_param_parsing() {
        assert_eq!(query_param("http://h/p?mock=true", "mock").as_deref(), Some("true"));
        assert_eq!(query_param("http://h/p?a=1&mock=false#x", "mock").as_deref(), Some("false"));
        assert_eq!(query_param("http://h/p?mock=a%20b&mock=true", "mock").as_deref(), Some("a b"));
        assert_eq!(query_param("http://h/p?mock", "mock").as_deref(), Some(""));
        assert_eq!(query_param("http://h/p#mock=true", "mock"), None);
        assert_eq!(query_param("http://h/p", "mock"), None);
    }

    #[test]
    fn test_url_param_always_wins() {
        let persisted = [None, Some("true"), Some("false")];
        let envs = [None, Some(true), Some(false)];
        for param in [true, false] {
            let url = format!("http://localhost/?mock={}", param);
            for p in persisted {
                for env in envs {
                    for dev in [true, false] {
                        let (r, store) = resolver(Some(&url), p, env, dev);
                        assert_eq!(r.is_synthetic_enabled(), param, "p={:?} env={:?} dev={}", p, env, dev);
                        assert_eq!(r.source(), ConfigSource::UrlParam);
                        assert_eq!(store.get(MOCK_STORAGE_KEY).as_deref(), Some(bool_str(param)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_lower_tiers_in_order() {
        let (r, _) = resolver(None, Some("false"), Some(true), true);
        assert!(!r.is_synthetic_enabled());
        assert_eq!(r.source(), ConfigSource::PersistedStore);

        let (r, _) = resolver(Some("http://h/?other=1"), None, Some(false), true);
        assert!(!r.is_synthetic_enabled());
        assert_eq!(r.source(), ConfigSource::Environment);

        let (r, _) = resolver(None, None, None, true);
        assert!(r.is_synthetic_enabled());
        assert_eq!(r.source(), ConfigSource::Default);

        let (r, store) = resolver(None, None, None, false);
        assert!(!r.is_synthetic_enabled());
        // Only the URL tier writes through.
        assert_eq!(store.get(MOCK_STORAGE_KEY), None);
    }

    #[test]
    fn test_url_true_overrides_persisted_false() {
        let (r, store) = resolver(Some("https://kubeasy.local/pods?mock=true"), Some("false"), None, false);
        assert!(r.is_synthetic_enabled());
        assert_eq!(store.get(MOCK_STORAGE_KEY).as_deref(), Some("true"));
    }

    #[test]
    fn test_memoized_until_reset() {
        let (r, store) = resolver(None, Some("true"), None, false);
        assert!(r.is_synthetic_enabled());

        // Lower tiers changing underneath must not be observed.
        store.set(MOCK_STORAGE_KEY, "false").unwrap();
        r.set_page_url(Some("http://h/?mock=false".into()));
        assert!(r.is_synthetic_enabled());
        assert!(r.is_synthetic_enabled());

        r.reset().unwrap();
        assert_eq!(store.get(MOCK_STORAGE_KEY), None);
        assert!(!r.is_synthetic_enabled());
        assert_eq!(r.source(), ConfigSource::UrlParam);
    }

    #[tokio::test]
    async fn test_set_enabled_persists_and_notifies() {
        let (r, store) = resolver(None, None, Some(false), false);
        let mut rx = r.subscribe();
        assert!(!r.is_synthetic_enabled());

        r.set_enabled(true).unwrap();
        assert!(r.is_synthetic_enabled());
        assert_eq!(store.get(MOCK_STORAGE_KEY).as_deref(), Some("true"));

        let change = rx.recv().await.unwrap();
        assert_eq!(change, ModeChange { enabled: true, previous: Some(false) });
    }

    #[test]
    fn test_debug_info_reports_raw_sources() {
        let (r, _) = resolver(Some("http://h/?mock=false"), Some("true"), Some(true), true);
        let info = r.debug_info();
        assert!(!info.enabled);
        assert_eq!(info.source, ConfigSource::UrlParam);
        assert_eq!(info.url_param.as_deref(), Some("false"));
        // The URL tier already wrote through.
        assert_eq!(info.persisted.as_deref(), Some("false"));
        assert_eq!(info.env_var, Some(true));
        assert!(info.is_dev);
    }
}

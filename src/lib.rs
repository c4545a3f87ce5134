pub mod client;
pub mod config;
pub mod error;
pub mod menu;
pub mod mock;
pub mod models;
pub mod oauth;
pub mod policy;
pub mod session;
pub mod settings;
pub mod storage;
pub mod transport;
pub mod utils;

use std::sync::Arc;

use tokio::task::JoinHandle;

pub use client::ResourceClient;
pub use config::{ConfigResolver, ConfigSource, ModeChange};
pub use error::{ApiError, StorageError, TransportError};
pub use menu::MenuService;
pub use mock::{DataStore, RefreshHandle};
pub use oauth::OAuthService;
pub use session::Session;
pub use settings::Settings;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use transport::{HttpTransport, Transport};

/// The assembled core: one resolver, one synthetic store, one client and the
/// services built on it, plus the background tasks that keep them current.
pub struct KubeEasy {
    settings: Settings,
    client: Arc<ResourceClient>,
    menus: Arc<MenuService>,
    oauth: Arc<OAuthService>,
    refresher: Option<RefreshHandle>,
    watchers: Vec<JoinHandle<()>>,
}

impl KubeEasy {
    /// Wire everything against the live HTTP API described by `settings`.
    pub async fn start(
        settings: Settings,
        kv: Arc<dyn KeyValueStore>,
        page_url: Option<String>,
    ) -> Result<Self, ApiError> {
        let session = Session::new(Arc::clone(&kv));
        let transport = HttpTransport::new(&settings, Some(session)).map_err(|source| ApiError::TransportFailure {
            operation: "start the HTTP client",
            source,
        })?;
        Ok(Self::start_with(settings, kv, page_url, Arc::new(transport)).await)
    }

    pub async fn start_with(
        settings: Settings,
        kv: Arc<dyn KeyValueStore>,
        page_url: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let config = Arc::new(ConfigResolver::new(&settings, Arc::clone(&kv), page_url));
        let store = Arc::new(DataStore::new());
        let session = Session::new(kv);
        let client = Arc::new(ResourceClient::new(&settings, Arc::clone(&config), Arc::clone(&store), transport, session));

        let refresher = store.spawn_refresher(settings.refresh_interval());
        let menus = Arc::new(MenuService::new(Arc::clone(&client)));
        let oauth = Arc::new(OAuthService::new(Arc::clone(&client)));
        let watchers = vec![menus.watch_mode_changes(), oauth.watch_mode_changes()];

        let info = config.debug_info();
        log::info!(
            "[startup] synthetic backend {} (source: {})",
            if info.enabled { "enabled" } else { "disabled" },
            info.source.describe()
        );

        if let Err(e) = menus.load().await {
            log::error!("[startup] failed to load menus: {}", e);
        }
        oauth.load_config().await;

        Self {
            settings,
            client,
            menus,
            oauth,
            refresher: Some(refresher),
            watchers,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &Arc<ConfigResolver> {
        self.client.config()
    }

    pub fn store(&self) -> &Arc<DataStore> {
        self.client.store()
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn client(&self) -> &Arc<ResourceClient> {
        &self.client
    }

    pub fn menus(&self) -> &Arc<MenuService> {
        &self.menus
    }

    pub fn oauth(&self) -> &Arc<OAuthService> {
        &self.oauth
    }

    /// Stop the refresher and the mode watchers.
    pub async fn shutdown(mut self) {
        if let Some(refresher) = self.refresher.take() {
            refresher.stop().await;
        }
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        log::info!("shut down");
    }
}

impl Drop for KubeEasy {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;

    fn settings(mock: Option<bool>) -> Settings {
        Settings { mock_enabled: mock, ..Settings::quiet() }
    }

    #[tokio::test]
    async fn test_start_synthetic() {
        let transport = ScriptedTransport::replying(vec![]);
        let app = KubeEasy::start_with(settings(Some(true)), Arc::new(MemoryStore::new()), None, transport.clone()).await;

        assert!(app.config().is_synthetic_enabled());
        assert_eq!(app.config().source(), ConfigSource::Environment);
        assert_eq!(app.menus().menus().len(), 8);
        assert_eq!(app.oauth().enabled_providers().len(), 4);
        assert!(!app.client().pods(None).await.unwrap().is_empty());
        assert!(transport.requests().is_empty());

        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_url_parameter_beats_persisted_store() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(config::MOCK_STORAGE_KEY, "false").unwrap();

        let transport = ScriptedTransport::replying(vec![]);
        let app = KubeEasy::start_with(
            settings(None),
            kv.clone(),
            Some("http://localhost:5173/dashboard?mock=true".into()),
            transport.clone(),
        )
        .await;

        assert!(app.config().is_synthetic_enabled());
        assert_eq!(app.config().source(), ConfigSource::UrlParam);
        assert_eq!(kv.get(config::MOCK_STORAGE_KEY).as_deref(), Some("true"));
        assert!(transport.requests().is_empty());
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_live_start_falls_back_when_unreachable() {
        let transport = ScriptedTransport::replying(vec![]);
        let app = KubeEasy::start_with(settings(Some(false)), Arc::new(MemoryStore::new()), None, transport.clone()).await;

        assert!(!app.config().is_synthetic_enabled());
        // Menus were retried once, then served from the catalog.
        assert_eq!(app.menus().menus().len(), 8);
        let menu_calls = transport.requests().iter().filter(|r| r.path == "/system/menus").count();
        assert_eq!(menu_calls, 2);
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_builds_http_transport() {
        let mut s = settings(Some(true));
        s.api_base_url = "http://127.0.0.1:9/api/".into();
        let app = KubeEasy::start(s, Arc::new(MemoryStore::new()), None).await.unwrap();
        assert!(app.config().is_synthetic_enabled());
        app.shutdown().await;
    }
}

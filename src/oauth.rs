//! OAuth sign-in: provider configuration cache, authorization URLs and the
//! synthetic callback exchange.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::client::{ResourceClient, SYNTHETIC_TOKEN_PREFIX};
use crate::error::Result;
use crate::models::{OAuthConfig, OAuthProvider, OAuthResponse, OAuthUserInfo};
use crate::utils::{epoch_millis, random_base36};

/// Partial update merged over the cached configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuthConfigPatch {
    pub enabled: Option<bool>,
    pub show_divider: Option<bool>,
    pub divider_text: Option<String>,
    pub providers: Option<Vec<OAuthProvider>>,
}

impl OAuthConfigPatch {
    pub fn apply(self, config: &mut OAuthConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(show) = self.show_divider {
            config.show_divider = show;
        }
        if let Some(text) = self.divider_text {
            config.divider_text = text;
        }
        if let Some(providers) = self.providers {
            config.providers = providers;
        }
    }
}

/// Opaque `state` for the authorize redirect: base64 of
/// `{provider}:{epoch_ms}:{random}`.
pub fn generate_state(provider_id: &str) -> String {
    let nonce = random_base36(&mut rand::thread_rng(), 13);
    BASE64.encode(format!("{}:{}:{}", provider_id, epoch_millis(), nonce))
}

/// Inverse of [`generate_state`]: (provider, issued at ms, nonce).
pub fn decode_state(state: &str) -> Option<(String, i64, String)> {
    let raw = String::from_utf8(BASE64.decode(state).ok()?).ok()?;
    let mut parts = raw.rsplitn(3, ':');
    let nonce = parts.next()?.to_string();
    let issued = parts.next()?.parse().ok()?;
    let provider = parts.next()?.to_string();
    Some((provider, issued, nonce))
}

/// Authorization redirect for `provider`, or `None` when it has no
/// authorize endpoint configured.
pub fn authorize_url(provider: &OAuthProvider) -> Option<String> {
    let Some(base) = provider.authorize_url.as_deref() else {
        log::warn!("provider {} has no authorize URL configured", provider.id);
        return None;
    };
    let state = generate_state(&provider.id);
    let params = [
        ("client_id", provider.client_id.as_deref().unwrap_or("")),
        ("redirect_uri", provider.redirect_uri.as_deref().unwrap_or("")),
        ("scope", provider.scope.as_deref().unwrap_or("")),
        ("response_type", "code"),
        ("state", state.as_str()),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Some(format!("{}?{}", base, query))
}

fn avatar_url(name: &str) -> String {
    format!("https://ui-avatars.com/api/?name={}&background=random", urlencoding::encode(name))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn failure(provider: &str, error: impl Into<String>) -> OAuthResponse {
    OAuthResponse {
        success: false,
        provider: provider.to_string(),
        token: None,
        user_info: None,
        error: Some(error.into()),
    }
}

pub struct OAuthService {
    client: Arc<ResourceClient>,
    config: RwLock<OAuthConfig>,
    loading: AtomicBool,
}

impl OAuthService {
    pub fn new(client: Arc<ResourceClient>) -> Self {
        Self {
            client,
            config: RwLock::new(OAuthConfig::default()),
            loading: AtomicBool::new(false),
        }
    }

    fn cached(&self) -> RwLockReadGuard<'_, OAuthConfig> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn replace(&self, config: OAuthConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    /// Fetch the configuration and cache it. On failure the cached copy is
    /// returned instead.
    pub async fn load_config(&self) -> OAuthConfig {
        match self.client.oauth_config().await {
            Ok(config) => {
                self.replace(config.clone());
                config
            }
            Err(e) => {
                log::error!("failed to load OAuth configuration: {}", e);
                self.config()
            }
        }
    }

    pub fn config(&self) -> OAuthConfig {
        self.cached().clone()
    }

    pub fn enabled_providers(&self) -> Vec<OAuthProvider> {
        self.cached().providers.iter().filter(|p| p.enabled).cloned().collect()
    }

    pub fn provider(&self, id: &str) -> Option<OAuthProvider> {
        self.cached().providers.iter().find(|p| p.id == id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Exchange an authorization callback for a session. The state must have
    /// been issued for the same provider.
    pub async fn handle_callback(&self, provider: &str, code: &str, state: &str) -> OAuthResponse {
        if code.is_empty() {
            return failure(provider, "missing authorization code");
        }
        match decode_state(state) {
            Some((issued_for, _, _)) if issued_for == provider => {}
            Some((issued_for, _, _)) => {
                log::warn!("OAuth state issued for {} presented by {}", issued_for, provider);
                return failure(provider, "state does not match provider");
            }
            None => return failure(provider, "invalid state parameter"),
        }

        self.loading.store(true, Ordering::SeqCst);
        self.client.simulate_delay(1000).await;
        self.loading.store(false, Ordering::SeqCst);

        log::info!("OAuth callback accepted for {}", provider);
        OAuthResponse {
            success: true,
            provider: provider.to_string(),
            token: Some(format!("{}{}-{}", SYNTHETIC_TOKEN_PREFIX, provider, epoch_millis())),
            user_info: Some(OAuthUserInfo {
                id: format!("{}-user-123", provider),
                email: format!("user@{}.com", provider),
                name: format!("{} User", capitalize(provider)),
                avatar: Some(avatar_url(provider)),
            }),
            error: None,
        }
    }

    /// Development sign-in that skips the provider round trip.
    pub async fn mock_login(&self, provider: &OAuthProvider) -> OAuthResponse {
        self.loading.store(true, Ordering::SeqCst);
        self.client.simulate_delay(1500).await;
        self.loading.store(false, Ordering::SeqCst);

        let suffix = random_base36(&mut rand::thread_rng(), 6);
        OAuthResponse {
            success: true,
            provider: provider.id.clone(),
            token: Some(format!("{}{}-{}", SYNTHETIC_TOKEN_PREFIX, provider.id, epoch_millis())),
            user_info: Some(OAuthUserInfo {
                id: format!("{}-user-{}", provider.id, suffix),
                email: format!("user@{}.com", provider.name.to_lowercase()),
                name: format!("{} Test User", provider.name),
                avatar: Some(avatar_url(&provider.name)),
            }),
            error: None,
        }
    }

    /// Merge `patch` over the cached configuration and save it. The cache
    /// only changes once the save succeeded.
    pub async fn update_config(&self, patch: OAuthConfigPatch) -> Result<()> {
        let mut updated = self.config();
        patch.apply(&mut updated);
        if let Err(e) = self.client.update_oauth_config(&updated).await {
            log::error!("failed to update OAuth configuration: {}", e);
            return Err(e);
        }
        self.replace(updated);
        Ok(())
    }

    /// Fetch the configuration for the current mode and publish it in one
    /// step. A failed fetch publishes the defaults rather than keeping the
    /// previous mode's providers.
    async fn reload(&self) {
        let config = match self.client.oauth_config().await {
            Ok(config) => config,
            Err(e) => {
                log::error!("failed to reload OAuth configuration: {}", e);
                OAuthConfig::default()
            }
        };
        self.replace(config);
    }

    /// Reload the cached configuration whenever the backend mode is switched.
    pub fn watch_mode_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.client.config().subscribe();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => service.reload().await,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::is_synthetic_token;
    use crate::client::testing::build;
    use crate::config::query_param;
    use crate::error::{ApiError, TransportError};
    use crate::mock::catalog;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::{ApiRequest, Transport};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Holds every request until released, then answers with `reply`.
    struct GatedTransport {
        gate: Notify,
        reply: Value,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn send(&self, _request: ApiRequest) -> std::result::Result<Value, TransportError> {
            self.gate.notified().await;
            Ok(self.reply.clone())
        }
    }

    fn service(synthetic: bool, transport: Arc<ScriptedTransport>) -> Arc<OAuthService> {
        Arc::new(OAuthService::new(Arc::new(build(synthetic, transport))))
    }

    #[test]
    fn test_state_round_trip() {
        let state = generate_state("github");
        let (provider, issued, nonce) = decode_state(&state).unwrap();
        assert_eq!(provider, "github");
        assert!(issued > 0);
        assert_eq!(nonce.len(), 13);
        assert_eq!(decode_state("%%%not-base64"), None);
        assert_eq!(decode_state(&BASE64.encode("no separators")), None);
    }

    #[test]
    fn test_authorize_url() {
        let config = catalog::oauth_config("http://localhost:5173");
        let google = &config.providers[0];
        let url = authorize_url(google).unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?client_id="));
        assert_eq!(query_param(&url, "client_id").as_deref(), Some("google-client-id"));
        assert_eq!(
            query_param(&url, "redirect_uri").as_deref(),
            Some("http://localhost:5173/auth/callback/google")
        );
        assert_eq!(query_param(&url, "scope").as_deref(), Some("openid profile email"));
        assert_eq!(query_param(&url, "response_type").as_deref(), Some("code"));
        let state = query_param(&url, "state").unwrap();
        assert_eq!(decode_state(&state).unwrap().0, "google");

        let mut bare = google.clone();
        bare.authorize_url = None;
        assert_eq!(authorize_url(&bare), None);
    }

    #[tokio::test]
    async fn test_load_and_enabled_providers() {
        let oauth = service(true, ScriptedTransport::replying(vec![]));
        assert!(oauth.enabled_providers().is_empty());

        let config = oauth.load_config().await;
        assert!(config.enabled);
        assert_eq!(oauth.enabled_providers().len(), 4);
        assert!(oauth.provider("feishu").is_some());
        assert!(oauth.provider("dingtalk").is_none());
    }

    #[tokio::test]
    async fn test_update_config_only_caches_on_success() {
        let oauth = service(false, ScriptedTransport::replying(vec![]));
        // Live fetch fails and falls back to the synthetic catalog.
        oauth.load_config().await;
        let before = oauth.config();

        let patch = OAuthConfigPatch { divider_text: Some("或".into()), ..Default::default() };
        let err = oauth.update_config(patch).await.unwrap_err();
        assert!(matches!(err, ApiError::TransportFailure { source: TransportError::Network(_), .. }));
        assert_eq!(oauth.config(), before);

        let oauth = service(true, ScriptedTransport::replying(vec![]));
        oauth.load_config().await;
        let mut providers = oauth.config().providers;
        providers[0].enabled = false;
        oauth
            .update_config(OAuthConfigPatch { providers: Some(providers), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(oauth.enabled_providers().len(), 3);
        assert_eq!(oauth.config().divider_text, "Or continue with");
    }

    #[tokio::test]
    async fn test_callback_signs_in() {
        let oauth = service(true, ScriptedTransport::replying(vec![]));
        let state = generate_state("github");

        let response = oauth.handle_callback("github", "code-1", &state).await;
        assert!(response.success);
        let token = response.token.clone().unwrap();
        assert!(is_synthetic_token(&token), "{}", token);
        let info = response.user_info.clone().unwrap();
        assert_eq!(info.id, "github-user-123");
        assert_eq!(info.email, "user@github.com");
        assert_eq!(info.name, "Github User");

        let session = oauth.client.session();
        session.login_with_oauth(&response).unwrap().unwrap();
        assert!(oauth.client.validate_token().await.unwrap());
    }

    #[tokio::test]
    async fn test_callback_rejects_bad_state() {
        let oauth = service(true, ScriptedTransport::replying(vec![]));

        let wrong = oauth.handle_callback("github", "code", &generate_state("google")).await;
        assert!(!wrong.success);
        assert!(wrong.error.is_some());

        let garbage = oauth.handle_callback("github", "code", "???").await;
        assert!(!garbage.success);

        let no_code = oauth.handle_callback("github", "", &generate_state("github")).await;
        assert!(!no_code.success);
    }

    #[tokio::test]
    async fn test_mock_login() {
        let oauth = service(true, ScriptedTransport::replying(vec![]));
        let github = catalog::oauth_config("http://localhost:5173").providers[1].clone();

        let response = oauth.mock_login(&github).await;
        assert!(response.success);
        assert_eq!(response.provider, "github");
        let info = response.user_info.unwrap();
        assert!(info.id.starts_with("github-user-"));
        assert_eq!(info.email, "user@github.com");
        assert_eq!(info.name, "GitHub Test User");
        assert!(!oauth.is_loading());
    }

    #[tokio::test]
    async fn test_mode_change_resets_cache() {
        let custom = serde_json::json!({
            "enabled": true, "showDivider": false, "dividerText": "live", "providers": []
        });
        let oauth = service(false, ScriptedTransport::replying(vec![Ok(custom)]));
        oauth.load_config().await;
        assert_eq!(oauth.config().divider_text, "live");

        let watcher = oauth.watch_mode_changes();
        oauth.client.config().set_enabled(true).unwrap();

        let mut switched = false;
        for _ in 0..200 {
            if oauth.enabled_providers().len() == 4 {
                switched = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        watcher.abort();
        assert!(switched);
        assert_eq!(oauth.config().divider_text, "Or continue with");
    }

    #[tokio::test]
    async fn test_mode_change_keeps_old_config_until_reload_finishes() {
        let transport = Arc::new(GatedTransport {
            gate: Notify::new(),
            reply: serde_json::json!({
                "enabled": true, "showDivider": false, "dividerText": "live", "providers": []
            }),
        });
        let oauth = Arc::new(OAuthService::new(Arc::new(build(true, transport.clone()))));
        oauth.load_config().await;
        assert_eq!(oauth.enabled_providers().len(), 4);

        let watcher = oauth.watch_mode_changes();
        oauth.client.config().set_enabled(false).unwrap();

        // The live fetch is parked on the gate; readers still see the
        // synthetic providers.
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(oauth.enabled_providers().len(), 4);
        }

        transport.gate.notify_one();
        let mut switched = false;
        for _ in 0..200 {
            if oauth.config().divider_text == "live" {
                switched = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        watcher.abort();
        assert!(switched);
        assert!(oauth.enabled_providers().is_empty());
    }
}

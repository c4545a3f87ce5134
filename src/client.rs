//! Resource client: one entry point per dashboard operation, switching
//! between the live API and the synthetic store on every call.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::ConfigResolver;
use crate::error::{ApiError, Result, TransportError};
use crate::mock::{catalog, DataStore};
use crate::models::*;
use crate::policy::{policy_for, OnFailure, Operation};
use crate::session::Session;
use crate::settings::Settings;
use crate::transport::{ApiRequest, Transport};
use crate::utils::{epoch_millis, random_base36};

/// Accepted by synthetic login: (username, password, role).
const SYNTHETIC_USERS: &[(&str, &str, &str)] = &[
    ("dukuan", "Q_Q727585266", "admin"),
    ("admin", "admin123", "admin"),
    ("user", "user123", "user"),
    ("developer", "dev123", "developer"),
];

pub const SYNTHETIC_TOKEN_PREFIX: &str = "mock-jwt-token-";

static SYNTHETIC_TOKEN: OnceLock<Option<Regex>> = OnceLock::new();

/// Tokens minted by synthetic login or synthetic OAuth.
pub fn is_synthetic_token(token: &str) -> bool {
    SYNTHETIC_TOKEN
        .get_or_init(|| Regex::new(r"^mock-jwt-token-[A-Za-z0-9_]+-[A-Za-z0-9]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(token))
}

/// Simulated round trip in synthetic mode: (minimum, spread) in ms.
fn latency_ms(op: Operation) -> (u64, u64) {
    match op {
        Operation::DashboardMetrics => (200, 800),
        Operation::Clusters => (300, 600),
        Operation::ClusterDetails => (200, 400),
        Operation::Pods => (300, 700),
        Operation::Deployments => (400, 600),
        Operation::Services => (200, 500),
        Operation::ScaleDeployment => (300, 500),
        Operation::Nodes | Operation::Namespaces | Operation::Events => (200, 500),
        Operation::Login => (500, 1000),
        Operation::Logout | Operation::ValidateToken | Operation::Menus => (200, 300),
        Operation::UpdateMenuPermissions => (300, 500),
        Operation::OAuthConfig => (300, 500),
        Operation::UpdateOAuthConfig => (500, 800),
    }
}

pub struct ResourceClient {
    config: Arc<ConfigResolver>,
    store: Arc<DataStore>,
    transport: Arc<dyn Transport>,
    session: Session,
    app_origin: String,
    simulate_latency: bool,
    retry_backoff: Duration,
}

impl ResourceClient {
    pub fn new(
        settings: &Settings,
        config: Arc<ConfigResolver>,
        store: Arc<DataStore>,
        transport: Arc<dyn Transport>,
        session: Session,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            session,
            app_origin: settings.app_origin.clone(),
            simulate_latency: settings.simulate_latency,
            retry_backoff: settings.retry_backoff(),
        }
    }

    pub fn config(&self) -> &Arc<ConfigResolver> {
        &self.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn app_origin(&self) -> &str {
        &self.app_origin
    }

    fn synthetic(&self) -> bool {
        self.config.is_synthetic_enabled()
    }

    async fn pause(&self, op: Operation) {
        if !self.simulate_latency {
            return;
        }
        let (min, spread) = latency_ms(op);
        let delay = rand::thread_rng().gen_range(min..min + spread);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    /// Fixed synthetic delay for flows outside the operation table.
    pub async fn simulate_delay(&self, millis: u64) {
        if self.simulate_latency {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    /// Send with the retries the policy grants for transient failures.
    async fn call(&self, op: Operation, request: ApiRequest) -> Result<Value, TransportError> {
        let retries = policy_for(op).retries;
        let mut attempt = 0;
        loop {
            match self.transport.send(request.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < retries && e.is_retryable() => {
                    attempt += 1;
                    log::debug!("{} failed ({}), retry {}/{}", op.label(), e, attempt, retries);
                    if !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, op: Operation, request: ApiRequest) -> Result<T, TransportError> {
        let value = self.call(op, request).await?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Read in the active mode. Live failures are resolved by the policy
    /// table: either the synthetic read or a wrapped error.
    async fn read<T, F>(&self, op: Operation, request: ApiRequest, synthetic: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&DataStore) -> Result<T>,
    {
        if self.synthetic() {
            self.pause(op).await;
            return synthetic(&self.store);
        }
        match self.fetch(op, request).await {
            Ok(value) => Ok(value),
            Err(e) => match policy_for(op).on_failure {
                OnFailure::Fallback => {
                    log::warn!("failed to {} ({}), falling back to synthetic data", op.label(), e);
                    synthetic(&self.store)
                }
                OnFailure::Propagate => Err(ApiError::TransportFailure { operation: op.label(), source: e }),
            },
        }
    }

    /// Live-only write; synthetic mode runs `synthetic` instead.
    async fn write<F>(&self, op: Operation, request: ApiRequest, synthetic: F) -> Result<()>
    where
        F: FnOnce(&DataStore),
    {
        if self.synthetic() {
            self.pause(op).await;
            synthetic(&self.store);
            return Ok(());
        }
        self.call(op, request)
            .await
            .map(|_| ())
            .map_err(|source| ApiError::TransportFailure { operation: op.label(), source })
    }

    pub async fn dashboard_metrics(&self) -> Result<DashboardMetrics> {
        self.read(Operation::DashboardMetrics, ApiRequest::get("/dashboard/metrics"), |s| Ok(s.dashboard()))
            .await
    }

    pub async fn clusters(&self) -> Result<Vec<ClusterInfo>> {
        self.read(Operation::Clusters, ApiRequest::get("/clusters"), |s| Ok(s.clusters())).await
    }

    pub async fn cluster_details(&self, name: &str) -> Result<ClusterInfo> {
        let path = format!("/clusters/{}", urlencoding::encode(name));
        self.read(Operation::ClusterDetails, ApiRequest::get(path), |s| {
            s.cluster(name).ok_or_else(|| ApiError::not_found("cluster", name))
        })
        .await
    }

    pub async fn pods(&self, namespace: Option<&str>) -> Result<Vec<PodInfo>> {
        let request = ApiRequest::get("/pods").query_opt("namespace", namespace);
        let pods = self.read(Operation::Pods, request, |s| Ok(s.pods(namespace))).await?;
        Ok(filter_namespace(pods, namespace))
    }

    pub async fn deployments(&self, namespace: Option<&str>) -> Result<Vec<DeploymentInfo>> {
        let request = ApiRequest::get("/deployments").query_opt("namespace", namespace);
        let deployments = self
            .read(Operation::Deployments, request, |s| Ok(s.deployments(namespace)))
            .await?;
        Ok(filter_namespace(deployments, namespace))
    }

    pub async fn services(&self, namespace: Option<&str>) -> Result<Vec<ServiceInfo>> {
        let request = ApiRequest::get("/services").query_opt("namespace", namespace);
        let services = self.read(Operation::Services, request, |s| Ok(s.services(namespace))).await?;
        Ok(filter_namespace(services, namespace))
    }

    pub async fn scale_deployment(&self, name: &str, namespace: &str, replicas: u32) -> Result<()> {
        let path = format!(
            "/deployments/{}/{}/scale",
            urlencoding::encode(namespace),
            urlencoding::encode(name)
        );
        let request = ApiRequest::patch(path).json(json!({ "replicas": replicas }));
        self.write(Operation::ScaleDeployment, request, |s| {
            if !s.apply_scale(name, namespace, replicas) {
                log::debug!("scale of unknown deployment {}/{} ignored", namespace, name);
            }
        })
        .await?;
        log::info!("scaled deployment {}/{} to {} replicas", namespace, name, replicas);
        Ok(())
    }

    pub async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        self.read(Operation::Nodes, ApiRequest::get("/nodes"), |s| Ok(s.nodes())).await
    }

    pub async fn namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        self.read(Operation::Namespaces, ApiRequest::get("/namespaces"), |s| Ok(s.namespaces()))
            .await
    }

    pub async fn events(&self) -> Result<Vec<EventInfo>> {
        self.read(Operation::Events, ApiRequest::get("/events"), |s| Ok(s.events())).await
    }

    /// Authenticate. The caller stores the returned session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        if self.synthetic() {
            self.pause(Operation::Login).await;
            return synthetic_login(username, password);
        }
        let request = ApiRequest::post("/auth/login").json(json!({ "username": username, "password": password }));
        self.fetch(Operation::Login, request).await.map_err(|e| {
            log::warn!("login for {} rejected: {}", username, e);
            ApiError::AuthenticationRejected(e.to_string())
        })
    }

    /// Tell the backend the session ends. Failures are logged only.
    pub async fn logout(&self) -> Result<()> {
        if self.synthetic() {
            self.pause(Operation::Logout).await;
            log::info!("synthetic logout");
            return Ok(());
        }
        if let Err(e) = self.call(Operation::Logout, ApiRequest::post("/auth/logout")).await {
            log::warn!("logout request failed: {}", e);
        }
        Ok(())
    }

    /// Whether the stored token is still accepted. Any failure means no.
    pub async fn validate_token(&self) -> Result<bool> {
        let Some(token) = self.session.token() else {
            return Ok(false);
        };
        if self.synthetic() {
            self.pause(Operation::ValidateToken).await;
            return Ok(is_synthetic_token(&token));
        }
        match self.call(Operation::ValidateToken, ApiRequest::get("/auth/validate")).await {
            Ok(_) => Ok(true),
            Err(e) => {
                log::debug!("token validation failed: {}", e);
                Ok(false)
            }
        }
    }

    pub async fn menus(&self) -> Result<Vec<MenuGroup>> {
        self.read(Operation::Menus, ApiRequest::get("/system/menus"), |_| Ok(catalog::menus()))
            .await
    }

    pub async fn update_menu_permissions(&self, user_id: &str, menu_ids: &[String]) -> Result<()> {
        let request = ApiRequest::post("/system/user-menus").json(json!({ "userId": user_id, "menuIds": menu_ids }));
        self.write(Operation::UpdateMenuPermissions, request, |_| {
            log::info!("synthetic menu permissions for {}: {:?}", user_id, menu_ids);
        })
        .await
    }

    pub async fn oauth_config(&self) -> Result<OAuthConfig> {
        let origin = self.app_origin.as_str();
        self.read(Operation::OAuthConfig, ApiRequest::get("/auth/oauth/config"), |_| {
            Ok(catalog::oauth_config(origin))
        })
        .await
    }

    pub async fn update_oauth_config(&self, config: &OAuthConfig) -> Result<()> {
        let body = serde_json::to_value(config)
            .map_err(|e| ApiError::TransportFailure {
                operation: Operation::UpdateOAuthConfig.label(),
                source: TransportError::Decode(e.to_string()),
            })?;
        let request = ApiRequest::post("/auth/oauth/config").json(body);
        self.write(Operation::UpdateOAuthConfig, request, |_| {
            log::info!("synthetic OAuth configuration accepted ({} providers)", config.providers.len());
        })
        .await
    }
}

fn synthetic_login(username: &str, password: &str) -> Result<LoginResponse> {
    let Some((_, _, role)) = SYNTHETIC_USERS
        .iter()
        .find(|(u, p, _)| *u == username && *p == password)
    else {
        log::warn!("synthetic login rejected for {}", username);
        return Err(ApiError::AuthenticationRejected("invalid username or password".to_string()));
    };
    let suffix = random_base36(&mut rand::thread_rng(), 11);
    Ok(LoginResponse {
        token: format!("{}{}-{}", SYNTHETIC_TOKEN_PREFIX, epoch_millis(), suffix),
        user: User {
            username: username.to_string(),
            email: Some(format!("{}@kubeasy.com", username)),
            roles: Some(vec![role.to_string()]),
            avatar: None,
            provider: None,
            provider_id: None,
        },
    })
}

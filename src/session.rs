//! Authenticated session: bearer token plus user, persisted in the key/value
//! store. The core only reads the token; hosts write it after login.

use std::sync::Arc;

use crate::error::StorageError;
use crate::models::{LoginResponse, OAuthResponse, User};
use crate::storage::KeyValueStore;

pub const TOKEN_KEY: &str = "kubeasy-token";
pub const USER_KEY: &str = "kubeasy-user";

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// A stored user that no longer parses is treated as absent.
    pub fn user(&self) -> Option<User> {
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("discarding unreadable stored user: {}", e);
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some() && self.user().is_some()
    }

    pub fn establish(&self, login: &LoginResponse) -> Result<(), StorageError> {
        self.store.set(TOKEN_KEY, &login.token)?;
        self.store.set(USER_KEY, &serde_json::to_string(&login.user)?)?;
        Ok(())
    }

    /// Sign in from a successful OAuth exchange. Returns the stored user, or
    /// `None` when the response carries no token or user info.
    pub fn login_with_oauth(&self, response: &OAuthResponse) -> Result<Option<User>, StorageError> {
        let (Some(token), Some(info)) = (&response.token, &response.user_info) else {
            return Ok(None);
        };
        if !response.success {
            return Ok(None);
        }
        let user = User {
            username: info.name.clone(),
            email: Some(info.email.clone()),
            roles: Some(vec!["user".to_string()]),
            avatar: info.avatar.clone(),
            provider: Some(response.provider.clone()),
            provider_id: Some(info.id.clone()),
        };
        self.establish(&LoginResponse { token: token.clone(), user: user.clone() })?;
        Ok(Some(user))
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)
    }
}

//! Navigation menu: loading, ordering, permission gating and breadcrumbs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::client::ResourceClient;
use crate::error::Result;
use crate::models::{Breadcrumb, MenuGroup, MenuItem};

pub const HOME_CRUMB_ID: &str = "home";
pub const HOME_CRUMB_TITLE: &str = "首页";
pub const HOME_CRUMB_ICON: &str = "🏠";

/// Keep enabled groups and enabled children, each sorted by `order`.
/// Equal orders keep their incoming relative position.
pub fn normalize(groups: Vec<MenuGroup>) -> Vec<MenuGroup> {
    let mut groups: Vec<MenuGroup> = groups
        .into_iter()
        .filter(|g| g.enabled)
        .map(|mut g| {
            g.children.retain(|c| c.enabled);
            g.children.sort_by_key(|c| c.order);
            g
        })
        .collect();
    groups.sort_by_key(|g| g.order);
    groups
}

fn visible<P: AsRef<str>>(item: &MenuItem, permissions: &[P]) -> bool {
    match item.permissions.as_deref() {
        None | Some([]) => true,
        Some(required) => required
            .iter()
            .any(|r| permissions.iter().any(|p| p.as_ref() == r.as_str())),
    }
}

/// Items without permissions are always shown; the rest need any one of
/// theirs. Groups that end up empty are dropped.
pub fn filter_by_permissions<P: AsRef<str>>(groups: &[MenuGroup], permissions: &[P]) -> Vec<MenuGroup> {
    groups
        .iter()
        .filter_map(|group| {
            let children: Vec<MenuItem> = group
                .children
                .iter()
                .filter(|item| visible(item, permissions))
                .cloned()
                .collect();
            if children.is_empty() {
                None
            } else {
                Some(MenuGroup { children, ..group.clone() })
            }
        })
        .collect()
}

pub struct MenuService {
    client: Arc<ResourceClient>,
    menus: RwLock<Arc<Vec<MenuGroup>>>,
    // Serializes loads; readers never take it.
    load_lock: tokio::sync::Mutex<()>,
    loading: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl MenuService {
    pub fn new(client: Arc<ResourceClient>) -> Self {
        Self {
            client,
            menus: RwLock::new(Arc::new(Vec::new())),
            load_lock: tokio::sync::Mutex::new(()),
            loading: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    /// Fetch, normalize and publish the menu. On failure the previous menu
    /// stays and the message is kept in [`MenuService::last_error`].
    pub async fn load(&self) -> Result<Arc<Vec<MenuGroup>>> {
        let _guard = self.load_lock.lock().await;
        self.loading.store(true, Ordering::SeqCst);
        *self.lock_error() = None;

        let result = self.client.menus().await;
        let outcome = match result {
            Ok(groups) => {
                let groups = Arc::new(normalize(groups));
                *self.menus.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&groups);
                log::debug!("menu loaded: {} groups", groups.len());
                Ok(groups)
            }
            Err(e) => {
                log::error!("failed to load menus: {}", e);
                *self.lock_error() = Some(e.to_string());
                Err(e)
            }
        };

        self.loading.store(false, Ordering::SeqCst);
        outcome
    }

    pub async fn refresh(&self) -> Result<Arc<Vec<MenuGroup>>> {
        self.load().await
    }

    /// The last published menu (empty before the first load).
    pub fn menus(&self) -> Arc<Vec<MenuGroup>> {
        Arc::clone(&self.menus.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock_error().clone()
    }

    pub fn visible_menus<P: AsRef<str>>(&self, permissions: &[P]) -> Vec<MenuGroup> {
        filter_by_permissions(&self.menus(), permissions)
    }

    pub fn find_menu_item(&self, path: &str) -> Option<(MenuGroup, MenuItem)> {
        let menus = self.menus();
        menus.iter().find_map(|group| {
            group
                .children
                .iter()
                .find(|item| item.path.as_deref() == Some(path))
                .map(|item| (group.clone(), item.clone()))
        })
    }

    /// Home, group, item; empty when `path` is not in the menu.
    pub fn breadcrumbs(&self, path: &str) -> Vec<Breadcrumb> {
        let Some((group, item)) = self.find_menu_item(path) else {
            return Vec::new();
        };
        vec![
            Breadcrumb {
                id: HOME_CRUMB_ID.to_string(),
                title: HOME_CRUMB_TITLE.to_string(),
                path: Some("/".to_string()),
                icon: HOME_CRUMB_ICON.to_string(),
                description: None,
            },
            Breadcrumb {
                id: group.id,
                title: group.title,
                path: None,
                icon: group.icon,
                description: None,
            },
            Breadcrumb {
                id: item.id,
                title: item.title,
                path: item.path,
                icon: item.icon,
                description: item.description,
            },
        ]
    }

    /// Reload whenever the backend mode is switched. Abort the handle to stop.
    pub fn watch_mode_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.client.config().subscribe();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        log::info!("backend mode changed (synthetic={}), reloading menus", change.enabled);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("missed {} mode changes, reloading menus", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
                // Errors are already recorded by load().
                let _ = service.load().await;
            }
        })
    }

    fn lock_error(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner())
    }
}

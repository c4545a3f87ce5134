//! Fixed synthetic catalogs: the navigation menu and the OAuth provider list.

use crate::models::{IconType, MenuGroup, MenuItem, OAuthConfig, OAuthProvider};

fn item(id: &str, title: &str, path: &str, icon: &str, order: i32, description: &str, permissions: &[&str]) -> MenuItem {
    MenuItem {
        id: id.to_string(),
        title: title.to_string(),
        path: Some(path.to_string()),
        icon: icon.to_string(),
        order,
        enabled: true,
        description: Some(description.to_string()),
        permissions: Some(permissions.iter().map(|p| p.to_string()).collect()),
        badge: None,
    }
}

fn group(id: &str, title: &str, icon: &str, order: i32, children: Vec<MenuItem>) -> MenuGroup {
    MenuGroup {
        id: id.to_string(),
        title: title.to_string(),
        icon: icon.to_string(),
        order,
        enabled: true,
        children,
    }
}

pub fn menus() -> Vec<MenuGroup> {
    vec![
        group("cluster-resources", "集群资源", "🏢", 1, vec![
            item("clusters", "集群管理", "/clusters", "⚙️", 1, "管理Kubernetes集群", &["cluster:read"]),
            item("nodes", "节点管理", "/nodes", "🖥️", 2, "管理集群节点", &["node:read"]),
            item("namespaces", "命名空间", "/namespaces", "📁", 3, "管理命名空间", &["namespace:read"]),
        ]),
        group("workload-resources", "调度资源", "📦", 2, vec![
            item("deployments", "Deployment", "/deployments", "🚀", 1, "管理部署", &["deployment:read"]),
            item("replicasets", "ReplicaSet", "/replicasets", "📋", 2, "管理副本集", &["replicaset:read"]),
            item("daemonsets", "DaemonSet", "/daemonsets", "👹", 3, "管理守护进程集", &["daemonset:read"]),
            item("statefulsets", "StatefulSet", "/statefulsets", "💾", 4, "管理有状态应用", &["statefulset:read"]),
            item("jobs", "Job/CronJob", "/jobs", "⏰", 5, "管理作业调度", &["job:read"]),
        ]),
        group("service-discovery", "服务发现", "🌐", 3, vec![
            item("services", "Service", "/services", "🔗", 1, "管理服务", &["service:read"]),
            item("ingress", "Ingress", "/ingress", "🌍", 2, "管理入口控制器", &["ingress:read"]),
            item("endpoints", "Endpoints", "/endpoints", "🎯", 3, "管理服务端点", &["endpoint:read"]),
        ]),
        group("config-storage", "配置管理", "⚙️", 4, vec![
            item("configmaps", "ConfigMap", "/configmaps", "📋", 1, "管理配置映射", &["configmap:read"]),
            item("secrets", "Secret", "/secrets", "🔒", 2, "管理敏感信息", &["secret:read"]),
            item("storage", "PV/PVC", "/storage", "💽", 3, "管理存储卷", &["pv:read", "pvc:read"]),
        ]),
        group("runtime", "运行时", "🔄", 5, vec![
            item("pods", "Pod", "/pods", "🐳", 1, "管理Pod实例", &["pod:read"]),
            item("events", "事件", "/events", "📢", 2, "查看集群事件", &["event:read"]),
            item("logs", "日志", "/logs", "📜", 3, "查看容器日志", &["log:read"]),
        ]),
        group("monitoring", "监控工具", "📊", 6, vec![
            item("metrics", "指标监控", "/metrics", "📈", 1, "监控系统指标", &["metric:read"]),
            item("alerts", "告警管理", "/alerts", "🚨", 2, "管理系统告警", &["alert:read"]),
        ]),
        group("tools", "实用工具", "🛠️", 7, vec![
            item("terminal", "终端", "/terminal", "💻", 1, "在线终端工具", &["terminal:access"]),
            item("yaml-editor", "YAML编辑", "/yaml-editor", "📝", 2, "YAML文件编辑器", &["yaml:edit"]),
            item("settings", "设置", "/settings", "⚙️", 3, "系统设置", &["setting:manage"]),
        ]),
        group("system-management", "系统管理", "🔧", 8, vec![
            item("menu-management", "菜单管理", "/system/menus", "📋", 1, "管理系统菜单结构", &["menu:manage"]),
            item("user-management", "用户管理", "/system/users", "👥", 2, "管理系统用户", &["user:manage"]),
            item("role-management", "角色管理", "/system/roles", "🎭", 3, "管理用户角色和权限", &["role:manage"]),
            item("oauth-config", "OAuth配置", "/system/oauth", "🔐", 4, "管理第三方登录配置", &["oauth:manage"]),
        ]),
    ]
}

struct ProviderSeed {
    id: &'static str,
    name: &'static str,
    color: &'static str,
    client_id: &'static str,
    scope: &'static str,
    authorize_url: &'static str,
    button_text: &'static str,
}

const PROVIDERS: &[ProviderSeed] = &[
    ProviderSeed {
        id: "google",
        name: "Google",
        color: "#4285f4",
        client_id: "google-client-id",
        scope: "openid profile email",
        authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
        button_text: "Google",
    },
    ProviderSeed {
        id: "github",
        name: "GitHub",
        color: "#181717",
        client_id: "github-client-id",
        scope: "user:email",
        authorize_url: "https://github.com/login/oauth/authorize",
        button_text: "GitHub",
    },
    ProviderSeed {
        id: "feishu",
        name: "Feishu",
        color: "#00d4aa",
        client_id: "feishu-app-id",
        scope: "user:profile",
        authorize_url: "https://open.feishu.cn/open-apis/authen/v1/index",
        button_text: "飞书",
    },
    ProviderSeed {
        id: "wechat",
        name: "WeChat",
        color: "#07c160",
        client_id: "wechat-app-id",
        scope: "snsapi_userinfo",
        authorize_url: "https://open.weixin.qq.com/connect/oauth2/authorize",
        button_text: "微信",
    },
];

/// Redirect URIs are rooted at `origin`.
pub fn oauth_config(origin: &str) -> OAuthConfig {
    let origin = origin.trim_end_matches('/');
    OAuthConfig {
        enabled: true,
        show_divider: true,
        divider_text: "Or continue with".to_string(),
        providers: PROVIDERS
            .iter()
            .map(|p| OAuthProvider {
                id: p.id.to_string(),
                name: p.name.to_string(),
                icon: format!("oauth:{}", p.id),
                icon_type: IconType::Component,
                color: p.color.to_string(),
                enabled: true,
                client_id: Some(p.client_id.to_string()),
                redirect_uri: Some(format!("{}/auth/callback/{}", origin, p.id)),
                scope: Some(p.scope.to_string()),
                authorize_url: Some(p.authorize_url.to_string()),
                button_text: Some(p.button_text.to_string()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_menu_paths_unique_and_permissioned() {
        let menus = menus();
        assert_eq!(menus.len(), 8);
        let mut paths = HashSet::new();
        for group in &menus {
            for item in &group.children {
                assert!(paths.insert(item.path.clone().unwrap()), "duplicate {:?}", item.path);
                assert!(!item.permissions.as_ref().unwrap().is_empty());
            }
        }
    }

    #[test]
    fn test_oauth_redirects_use_origin() {
        let config = oauth_config("https://console.example.com/");
        assert_eq!(config.providers.len(), 4);
        assert_eq!(
            config.providers[1].redirect_uri.as_deref(),
            Some("https://console.example.com/auth/callback/github")
        );
    }
}

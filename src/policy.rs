//! What the resource client does when a live call fails, per operation.
//!
//! Reads fall back to synthetic data; writes and authentication surface the
//! failure. Retries are only spent on idempotent reads and only for
//! transient errors.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    DashboardMetrics,
    Clusters,
    ClusterDetails,
    Pods,
    Deployments,
    ScaleDeployment,
    Services,
    Nodes,
    Namespaces,
    Events,
    Login,
    Logout,
    ValidateToken,
    Menus,
    UpdateMenuPermissions,
    OAuthConfig,
    UpdateOAuthConfig,
}

impl Operation {
    pub const ALL: [Operation; 17] = [
        Operation::DashboardMetrics,
        Operation::Clusters,
        Operation::ClusterDetails,
        Operation::Pods,
        Operation::Deployments,
        Operation::ScaleDeployment,
        Operation::Services,
        Operation::Nodes,
        Operation::Namespaces,
        Operation::Events,
        Operation::Login,
        Operation::Logout,
        Operation::ValidateToken,
        Operation::Menus,
        Operation::UpdateMenuPermissions,
        Operation::OAuthConfig,
        Operation::UpdateOAuthConfig,
    ];

    /// Used in error messages: "failed to {label}".
    pub fn label(self) -> &'static str {
        match self {
            Operation::DashboardMetrics => "fetch dashboard metrics",
            Operation::Clusters => "list clusters",
            Operation::ClusterDetails => "fetch cluster details",
            Operation::Pods => "list pods",
            Operation::Deployments => "list deployments",
            Operation::ScaleDeployment => "scale deployment",
            Operation::Services => "list services",
            Operation::Nodes => "list nodes",
            Operation::Namespaces => "list namespaces",
            Operation::Events => "list events",
            Operation::Login => "log in",
            Operation::Logout => "log out",
            Operation::ValidateToken => "validate token",
            Operation::Menus => "load menus",
            Operation::UpdateMenuPermissions => "update menu permissions",
            Operation::OAuthConfig => "fetch OAuth configuration",
            Operation::UpdateOAuthConfig => "update OAuth configuration",
        }
    }

    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::ScaleDeployment
                | Operation::UpdateMenuPermissions
                | Operation::UpdateOAuthConfig
                | Operation::Login
                | Operation::Logout
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnFailure {
    /// Serve the synthetic equivalent and log a warning.
    Fallback,
    /// Return the error to the caller.
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailurePolicy {
    /// Extra attempts for retryable transport errors.
    pub retries: u32,
    pub on_failure: OnFailure,
}

const fn fallback(retries: u32) -> FailurePolicy {
    FailurePolicy { retries, on_failure: OnFailure::Fallback }
}

const PROPAGATE: FailurePolicy = FailurePolicy { retries: 0, on_failure: OnFailure::Propagate };

pub fn policy_for(op: Operation) -> FailurePolicy {
    match op {
        Operation::DashboardMetrics
        | Operation::Clusters
        | Operation::ClusterDetails
        | Operation::Pods
        | Operation::Deployments
        | Operation::Services
        | Operation::Nodes
        | Operation::Namespaces
        | Operation::Events
        | Operation::OAuthConfig => fallback(0),
        // The menu drives navigation; one more try before going synthetic.
        Operation::Menus => fallback(1),
        // Nothing synthetic to fall back to: a fabricated session, a scale
        // that never happened or a config that was never saved.
        Operation::Login
        | Operation::ScaleDeployment
        | Operation::UpdateMenuPermissions
        | Operation::UpdateOAuthConfig => PROPAGATE,
        // Validation failures mean "invalid"; logout failures are logged.
        Operation::ValidateToken | Operation::Logout => PROPAGATE,
    }
}

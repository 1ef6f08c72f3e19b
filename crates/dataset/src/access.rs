//! Per-view access checks
//!
//! With `PUBLIC` set every view is served. Otherwise a view method is
//! served when its `can_*` permission is among the view's base
//! permissions and the security manager grants it on the view. Anyone
//! else is sent to the login page with the requested URL in `next`.

use annostore::Settings;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Prefix of every permission string
pub const PERMISSION_PREFIX: &str = "can_";

/// Login route when no `SCRIPT_NAME` prefix applies
pub const DEFAULT_LOGIN_PATH: &str = "/login/";

/// Message flashed to a user who was refused
pub const ACCESS_DENIED_MESSAGE: &str = "Access is Denied";

/// The security manager's grant lookup
pub trait PermissionChecker: Send + Sync {
    fn has_access(&self, permission: &str, view_name: &str) -> bool;
}

/// Fixed set of `(permission, view)` grants
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    grants: HashSet<(String, String)>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn grant<P: Into<String>, V: Into<String>>(mut self, permission: P, view_name: V) -> Self {
        _ = self.grants.insert((permission.into(), view_name.into()));
        self
    }
}

impl PermissionChecker for GrantTable {
    fn has_access(&self, permission: &str, view_name: &str) -> bool {
        self.grants
            .contains(&(permission.to_string(), view_name.to_string()))
    }
}

/// Permissions a view declares
#[derive(Debug, Clone, Default)]
pub struct ViewPermissions {
    /// Name grants are recorded against
    pub class_permission_name: String,
    /// Full permission strings, `can_` included
    pub base_permissions: HashSet<String>,
    /// Per-method permission names replacing the method's own
    pub method_permission_name: HashMap<String, String>,
}

impl ViewPermissions {
    pub fn new<S: Into<String>>(class_permission_name: S) -> Self {
        Self {
            class_permission_name: class_permission_name.into(),
            ..Self::default()
        }
    }

    /// Add `can_{name}` to the base permissions
    #[must_use]
    pub fn allow(mut self, name: &str) -> Self {
        _ = self.base_permissions.insert(format!("{PERMISSION_PREFIX}{name}"));
        self
    }

    /// Check `method` against `can_{name}` instead of its own permission name
    #[must_use]
    pub fn rename_method<M: Into<String>, N: Into<String>>(mut self, method: M, name: N) -> Self {
        _ = self.method_permission_name.insert(method.into(), name.into());
        self
    }

    /// Permission string checked for `endpoint`
    pub fn permission_for(&self, endpoint: &Endpoint<'_>) -> String {
        let name = self
            .method_permission_name
            .get(endpoint.method)
            .map(String::as_str)
            .unwrap_or_else(|| endpoint.permission_name());
        format!("{PERMISSION_PREFIX}{name}")
    }
}

/// One view method being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub method: &'a str,
    /// Declared permission name; the method name when absent
    pub permission_name: Option<&'a str>,
}

impl<'a> Endpoint<'a> {
    pub fn new(method: &'a str) -> Self {
        Self {
            method,
            permission_name: None,
        }
    }

    #[must_use]
    pub fn with_permission_name(mut self, name: &'a str) -> Self {
        self.permission_name = Some(name);
        self
    }

    pub fn permission_name(&self) -> &'a str {
        self.permission_name.unwrap_or(self.method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Send the user to `location`, showing `message`
    Redirect {
        location: String,
        message: &'static str,
    },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Login route, prefixed with `SCRIPT_NAME` when one is set
pub fn login_path(settings: &Settings) -> String {
    match &settings.script_name {
        Some(prefix) => format!("{}{DEFAULT_LOGIN_PATH}", prefix.trim_end_matches('/')),
        None => DEFAULT_LOGIN_PATH.to_string(),
    }
}

pub struct AccessPolicy {
    public: bool,
    login_path: String,
    checker: Arc<dyn PermissionChecker>,
}

impl AccessPolicy {
    pub fn new<S: Into<String>>(
        public: bool,
        login_path: S,
        checker: Arc<dyn PermissionChecker>,
    ) -> Self {
        if public {
            diagnostics::info!("Public access is enabled");
        } else {
            diagnostics::info!("Public access not enabled");
        }
        Self {
            public,
            login_path: login_path.into(),
            checker,
        }
    }

    /// Policy following `PUBLIC`, with the login route under `SCRIPT_NAME`
    pub fn from_settings(settings: &Settings, checker: Arc<dyn PermissionChecker>) -> Self {
        Self::new(settings.public, login_path(settings), checker)
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Decide whether `endpoint` of `view` may serve `request_url`
    pub fn check(
        &self,
        view: &ViewPermissions,
        endpoint: &Endpoint<'_>,
        request_url: &str,
    ) -> AccessDecision {
        if self.public {
            return AccessDecision::Allow;
        }

        let permission = view.permission_for(endpoint);
        if view.base_permissions.contains(&permission)
            && self
                .checker
                .has_access(&permission, &view.class_permission_name)
        {
            return AccessDecision::Allow;
        }

        let view_name = view.class_permission_name.as_str();
        diagnostics::warn!(
            "Access is Denied for: {permission} on: {view_name}",
            permission: permission,
            view_name: view_name
        );
        self.login_redirect(request_url)
    }

    /// Dashboards are served to everyone when public, otherwise to signed-in users
    pub fn check_dashboard(&self, authenticated: bool, request_url: &str) -> AccessDecision {
        if self.public || authenticated {
            AccessDecision::Allow
        } else {
            self.login_redirect(request_url)
        }
    }

    fn login_redirect(&self, next: &str) -> AccessDecision {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("next", next)
            .finish();
        AccessDecision::Redirect {
            location: format!("{}?{query}", self.login_path),
            message: ACCESS_DENIED_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_view() -> ViewPermissions {
        ViewPermissions::new("DatasetListView")
            .allow("list")
            .allow("read")
            .rename_method("choose", "read")
    }

    fn policy(public: bool, checker: GrantTable) -> AccessPolicy {
        AccessPolicy::new(public, DEFAULT_LOGIN_PATH, Arc::new(checker))
    }

    #[test]
    fn test_public_allows_everything() {
        let policy = policy(true, GrantTable::new());
        let view = ViewPermissions::new("Nothing");
        assert!(policy.check(&view, &Endpoint::new("delete"), "/x").is_allowed());
        assert!(policy.check_dashboard(false, "/dash/").is_allowed());
    }

    #[test]
    fn test_granted_base_permission_allows() {
        let grants = GrantTable::new().grant("can_list", "DatasetListView");
        let policy = policy(false, grants);
        let decision = policy.check(&list_view(), &Endpoint::new("list"), "/datasets/list/");
        assert_eq!(decision, AccessDecision::Allow);
    }

    #[test]
    fn test_grant_without_base_permission_is_refused() {
        let grants = GrantTable::new().grant("can_delete", "DatasetListView");
        let policy = policy(false, grants);
        let decision = policy.check(&list_view(), &Endpoint::new("delete"), "/datasets/delete/");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_base_permission_without_grant_is_refused() {
        let grants = GrantTable::new().grant("can_list", "OtherView");
        let policy = policy(false, grants);
        let decision = policy.check(&list_view(), &Endpoint::new("list"), "/datasets/list/");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_method_override_replaces_permission_name() {
        let view = list_view();
        assert_eq!(view.permission_for(&Endpoint::new("choose")), "can_read");
        assert_eq!(
            view.permission_for(&Endpoint::new("show").with_permission_name("list")),
            "can_list"
        );
        assert_eq!(view.permission_for(&Endpoint::new("show")), "can_show");

        let grants = GrantTable::new().grant("can_read", "DatasetListView");
        let policy = policy(false, grants);
        let decision = policy.check(&view, &Endpoint::new("choose"), "/datasets/choose/");
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_refusal_redirects_to_login_with_next() {
        let policy = policy(false, GrantTable::new());
        let decision = policy.check(
            &list_view(),
            &Endpoint::new("list"),
            "http://host/datasets/list/?page=2&q=a b",
        );
        let location = "/login/?next=http%3A%2F%2Fhost%2Fdatasets%2Flist%2F%3Fpage%3D2%26q%3Da+b";
        let expected = AccessDecision::Redirect {
            location: location.to_string(),
            message: ACCESS_DENIED_MESSAGE,
        };
        assert_eq!(decision, expected);
    }

    #[test]
    fn test_dashboard_needs_sign_in_unless_public() {
        let policy = policy(false, GrantTable::new());
        assert!(policy.check_dashboard(true, "/dash/").is_allowed());
        assert!(matches!(
            policy.check_dashboard(false, "/dash/"),
            AccessDecision::Redirect { .. }
        ));
    }

    #[test]
    fn test_login_path_follows_script_name() {
        let settings = Settings::from_lookup(|key| match key {
            "SCRIPT_NAME" => Some("/proxy/".to_string()),
            "PUBLIC" => Some("false".to_string()),
            _ => None,
        })
        .expect("settings");
        let policy = AccessPolicy::from_settings(&settings, Arc::new(GrantTable::new()));
        assert!(!policy.is_public());
        assert_eq!(policy.login_path(), "/proxy/login/");

        let public = Settings::from_lookup(|key| (key == "PUBLIC").then(|| "1".to_string()))
            .expect("settings");
        let policy = AccessPolicy::from_settings(&public, Arc::new(GrantTable::new()));
        assert!(policy.is_public());
        assert_eq!(policy.login_path(), DEFAULT_LOGIN_PATH);
    }
}

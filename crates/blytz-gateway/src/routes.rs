//! Route guard for the dashboard pages.

use blytz_models::UserRole;
use blytz_session::CredentialCache;
use tracing::debug;

/// Paths that require a cached session.
pub const PROTECTED_PREFIXES: [&str; 3] = ["/employer/dashboard", "/va/dashboard", "/select-role"];

/// Sign-in entry point for unauthenticated visitors.
pub const SIGN_IN_PATH: &str = "/auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Continue,
    Redirect(String),
}

pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
    })
}

/// Decide whether a navigation to `path` may proceed.
pub fn guard(path: &str, credentials: &CredentialCache) -> RouteDecision {
    if is_protected(path) && !credentials.is_authenticated() {
        debug!(path, "Protected route without session");
        return RouteDecision::Redirect(SIGN_IN_PATH.to_string());
    }
    RouteDecision::Continue
}

pub fn dashboard_path(role: UserRole) -> &'static str {
    match role {
        UserRole::Employer => "/employer/dashboard",
        UserRole::Va => "/va/dashboard",
    }
}

pub fn onboarding_path(role: UserRole) -> &'static str {
    match role {
        UserRole::Employer => "/employer/onboarding",
        UserRole::Va => "/va/onboarding",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use blytz_models::{SessionToken, UserSummary};
    use blytz_session::MemorySessionStore;

    use super::*;

    fn cache() -> CredentialCache {
        CredentialCache::new(Arc::new(MemorySessionStore::new()))
    }

    #[test]
    fn test_protected_paths_redirect_without_session() {
        let credentials = cache();
        for path in ["/employer/dashboard", "/va/dashboard/jobs", "/select-role?from=auth"] {
            assert_eq!(
                guard(path, &credentials),
                RouteDecision::Redirect("/auth".to_string()),
                "{path}"
            );
        }
    }

    #[test]
    fn test_public_paths_continue() {
        let credentials = cache();
        for path in ["/", "/auth", "/employer/onboarding", "/va/dashboards-info"] {
            assert_eq!(guard(path, &credentials), RouteDecision::Continue, "{path}");
        }
    }

    #[test]
    fn test_session_unlocks_protected_paths() {
        let credentials = cache();
        credentials
            .establish(&SessionToken::new("t1"), &UserSummary::new("u1"))
            .unwrap();
        assert_eq!(guard("/va/dashboard", &credentials), RouteDecision::Continue);
    }

    #[test]
    fn test_role_landing_pages() {
        assert_eq!(dashboard_path(UserRole::Employer), "/employer/dashboard");
        assert_eq!(onboarding_path(UserRole::Va), "/va/onboarding");
    }
}

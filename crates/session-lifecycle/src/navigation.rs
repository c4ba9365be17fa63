//! Route collaborator and protected-route matching.

use parking_lot::Mutex;
use tracing::info;

/// The application's router, seen from the session core.
pub trait Navigator: Send + Sync {
    /// May keep reporting the old route for a while after `navigate`.
    fn current_path(&self) -> String;
    fn navigate(&self, path: &str);
}

/// Route prefixes that require a signed-in user.
///
/// A prefix matches itself and anything below it: `/profile` protects
/// `/profile` and `/profile/password` but not `/profiles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoutes {
    prefixes: Vec<String>,
}

impl ProtectedRoutes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.into().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        self.prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Navigator for runs without a UI: remembers the path and logs moves.
pub struct HeadlessNavigator {
    path: Mutex<String>,
}

impl HeadlessNavigator {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            path: Mutex::new(initial_path.into()),
        }
    }
}

impl Navigator for HeadlessNavigator {
    fn current_path(&self) -> String {
        self.path.lock().clone()
    }

    fn navigate(&self, path: &str) {
        info!(path, "Navigating");
        *self.path.lock() = path.to_string();
    }
}

//! Path-based authentication requirement filter.
//!
//! Configured from the mutually exclusive `--only` / `--except` flags. With
//! neither flag present every path requires authentication.

/// Which request paths require authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathPolicy {
    /// No filter configured: authenticate every request.
    All,
    /// Authenticate only requests matching one of these patterns.
    Only(Vec<String>),
    /// Authenticate everything except requests matching one of these patterns.
    Except(Vec<String>),
}

impl PathPolicy {
    /// Build a policy from the parsed `--only` / `--except` lists. The CLI
    /// rejects supplying both, so at most one list is non-empty here.
    #[must_use]
    pub fn from_lists(only: Vec<String>, except: Vec<String>) -> Self {
        if !only.is_empty() {
            Self::Only(only)
        } else if !except.is_empty() {
            Self::Except(except)
        } else {
            Self::All
        }
    }

    /// Whether a request for `path` must present credentials.
    #[must_use]
    pub fn requires_auth(&self, path: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(patterns) => patterns.iter().any(|p| path_matches(path, p)),
            Self::Except(patterns) => !patterns.iter().any(|p| path_matches(path, p)),
        }
    }
}

/// Case-insensitive prefix match, the path semantics of the host router.
fn path_matches(path: &str, pattern: &str) -> bool {
    path.len() >= pattern.len() && path[..pattern.len()].eq_ignore_ascii_case(pattern)
}

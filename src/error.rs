//! Error taxonomy for page objects, polling assertions and cross-persona checks

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::compare::Violation;

/// Errors raised by a [`Session`](crate::session::Session) backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The browser (or simulator) rejected the operation
    #[error("{operation} failed on `{selector}`: {reason}")]
    Action {
        operation: &'static str,
        selector: String,
        reason: String,
    },

    /// Navigation could not be issued at all
    #[error("navigation to {url} failed: {reason}")]
    Goto { url: String, reason: String },

    /// Backend-level failure (driver crashed, session closed, ...)
    #[error("browser backend error: {0}")]
    Backend(String),
}

/// Best-effort state captured when an action fails
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Location of the page when the failure was observed
    pub url: Option<String>,
    /// Screenshot written to the artifacts directory, if one was taken
    pub screenshot: Option<PathBuf>,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "at {url}")?,
            None => write!(f, "at <unknown location>")?,
        }
        if let Some(path) = &self.screenshot {
            write!(f, ", screenshot {}", path.display())?;
        }
        Ok(())
    }
}

/// Errors surfaced to scenarios by the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    /// `navigate()` did not land on the page's canonical address
    #[error("expected to be at {expected}, ended up {diagnostics}")]
    Navigation {
        expected: String,
        diagnostics: Diagnostics,
    },

    /// A locator that must match exactly one element matched none
    #[error("no element for `{key}` on {page} page (query `{query}`, {diagnostics})")]
    ElementNotFound {
        page: &'static str,
        key: &'static str,
        query: String,
        diagnostics: Diagnostics,
    },

    /// An action's expected post-condition was not observed in time
    #[error("{action}: expected {expected} within {elapsed:?}, last saw {observed} ({diagnostics})")]
    TransitionTimeout {
        action: String,
        expected: String,
        observed: String,
        elapsed: Duration,
        diagnostics: Diagnostics,
    },

    /// The page showed something the operation did not expect
    #[error("unexpected state on {page} page: {detail} ({diagnostics})")]
    UnexpectedState {
        page: &'static str,
        detail: String,
        diagnostics: Diagnostics,
    },

    /// A polling predicate never held
    #[error("timed out after {elapsed:?} waiting for {what}; last observed: {last_observed}")]
    AssertionTimeout {
        what: String,
        last_observed: String,
        elapsed: Duration,
    },

    /// Fixture lookup for an unregistered persona
    #[error("unknown persona: {0}")]
    UnknownPersona(String),

    /// Cross-persona comparison broke its field policy
    #[error("{} cross-persona policy violation(s): {}", .0.len(), join_violations(.0))]
    PolicyViolation(Vec<Violation>),

    /// A whole scenario exceeded its time budget
    #[error("scenario `{scenario}` exceeded {limit:?}")]
    ScenarioTimeout { scenario: String, limit: Duration },

    /// A rendered price could not be parsed
    #[error("invalid price text: {0:?}")]
    InvalidPrice(String),

    /// Invalid configuration value
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_display_without_location() {
        let diag = Diagnostics::default();
        assert_eq!(diag.to_string(), "at <unknown location>");
    }

    #[test]
    fn diagnostics_display_with_screenshot() {
        let diag = Diagnostics {
            url: Some("https://www.saucedemo.com/v1/cart.html".to_string()),
            screenshot: Some(PathBuf::from("artifacts/cart.png")),
        };
        assert_eq!(
            diag.to_string(),
            "at https://www.saucedemo.com/v1/cart.html, screenshot artifacts/cart.png"
        );
    }

    #[test]
    fn session_error_converts_into_harness_error() {
        let err: HarnessError = SessionError::Backend("driver exited".to_string()).into();
        assert!(matches!(err, HarnessError::Session(_)));
        assert_eq!(err.to_string(), "browser backend error: driver exited");
    }
}

//! Error taxonomy for the interception engine.
//!
//! A request that matches no rule is not an error; see
//! [`MatchOutcome::NoMatch`](crate::registry::MatchOutcome).

use std::time::Duration;

/// Errors surfaced to the test layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InterceptError {
    #[error("Response handler for alias '{alias}' failed: {reason}")]
    ResolutionFailure { alias: String, reason: String },

    #[error("Timed out after {waited:?} waiting for alias '@{alias}'")]
    Timeout { alias: String, waited: Duration },

    #[error("Transport error for {method} {url}: {reason}")]
    Transport {
        method: String,
        url: String,
        reason: String,
    },

    #[error("{method} {url} returned unexpected status {status}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
    },

    #[error("Fixture '{name}' unavailable: {reason}")]
    Fixture { name: String, reason: String },

    #[error("Alias '@{0}' was never bound or set")]
    UnknownAlias(String),

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("No intercept rule registered as {0}")]
    UnknownRule(String),
}

impl InterceptError {
    /// Alias the error refers to, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            InterceptError::ResolutionFailure { alias, .. }
            | InterceptError::Timeout { alias, .. } => Some(alias),
            InterceptError::UnknownAlias(alias) => Some(alias),
            _ => None,
        }
    }

    /// Re-label a resolution failure with the alias the rule is bound to.
    pub(crate) fn with_alias(self, bound: &str) -> Self {
        match self {
            InterceptError::ResolutionFailure { reason, .. } => InterceptError::ResolutionFailure {
                alias: bound.to_string(),
                reason,
            },
            other => other,
        }
    }
}

/// Failure raised inside a response handler while inspecting a live response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerError {
    #[error("expected {path} to equal {expected}, got {actual}")]
    Assertion {
        path: String,
        expected: serde_json::Value,
        actual: serde_json::Value,
    },

    #[error("{0}")]
    Message(String),
}

impl HandlerError {
    pub fn message(msg: impl Into<String>) -> Self {
        HandlerError::Message(msg.into())
    }
}

pub type Result<T, E = InterceptError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timeout_message_names_alias() {
        let err = InterceptError::Timeout {
            alias: "postArticles".to_string(),
            waited: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("@postArticles"));
        assert_eq!(err.alias(), Some("postArticles"));
    }

    #[test]
    fn test_assertion_message() {
        let err = HandlerError::Assertion {
            path: "article.description".to_string(),
            expected: json!("a"),
            actual: json!("b"),
        };
        assert_eq!(
            err.to_string(),
            r#"expected article.description to equal "a", got "b""#
        );
    }

    #[test]
    fn test_transport_error_has_no_alias() {
        let err = InterceptError::Transport {
            method: "GET".to_string(),
            url: "http://localhost/x".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.alias().is_none());
    }
}

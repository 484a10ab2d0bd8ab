//! Captured exchange types.

use crate::error::InterceptError;
use crate::message::{InterceptedRequest, InterceptedResponse};
use crate::registry::RuleHandle;
use serde::Serialize;

/// Whether the exchange reached the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ExchangeStatus {
    Delivered,
    /// Resolution failed; the application received an error instead.
    Failed { kind: FailureKind, reason: String },
}

/// Stage of resolution that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The response handler rejected the live response.
    Handler,
    /// The live call behind a dynamic rule never produced a response.
    Transport,
    Fixture { name: String },
}

impl ExchangeStatus {
    /// Failed status carrying the kind and reason of `err`.
    pub fn failed(err: &InterceptError) -> Self {
        let (kind, reason) = match err {
            InterceptError::Transport { reason, .. } => (FailureKind::Transport, reason.clone()),
            InterceptError::Fixture { name, reason } => (
                FailureKind::Fixture { name: name.clone() },
                reason.clone(),
            ),
            InterceptError::ResolutionFailure { reason, .. } => {
                (FailureKind::Handler, reason.clone())
            }
            other => (FailureKind::Handler, other.to_string()),
        };
        ExchangeStatus::Failed { kind, reason }
    }
}

/// Request/response pair captured under an alias. Immutable once stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedExchange {
    pub alias: String,
    pub rule: RuleHandle,
    /// Per-alias sequence number, starting at 1.
    pub sequence: u64,
    pub request: InterceptedRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<InterceptedResponse>,
    pub status: ExchangeStatus,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

impl CapturedExchange {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExchangeStatus::Failed { .. })
    }

    /// Delivered response, or the error that stopped resolution.
    pub fn response(&self) -> Result<&InterceptedResponse, InterceptError> {
        match (&self.status, &self.response) {
            (ExchangeStatus::Delivered, Some(response)) => Ok(response),
            (ExchangeStatus::Failed { kind, reason }, _) => Err(self.failure(kind, reason)),
            (ExchangeStatus::Delivered, None) => Err(InterceptError::ResolutionFailure {
                alias: self.alias.clone(),
                reason: "exchange has no response".to_string(),
            }),
        }
    }

    fn failure(&self, kind: &FailureKind, reason: &str) -> InterceptError {
        match kind {
            FailureKind::Handler => InterceptError::ResolutionFailure {
                alias: self.alias.clone(),
                reason: reason.to_string(),
            },
            FailureKind::Transport => InterceptError::Transport {
                method: self.request.method.clone(),
                url: self.request.url.clone(),
                reason: reason.to_string(),
            },
            FailureKind::Fixture { name } => InterceptError::Fixture {
                name: name.clone(),
                reason: reason.to_string(),
            },
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }
}

/// Lifecycle of an alias within one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AliasState {
    /// Never bound.
    Unbound,
    /// Bound, with no exchange yet or a matching request still resolving.
    AwaitingMatch,
    /// Holds a resolved exchange.
    Resolved,
}

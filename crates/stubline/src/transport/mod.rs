//! Real network transport used for pass-through, live responses handed to
//! response handlers, and direct requests.
//!
//! - `http` - reqwest-backed transport
//! - `scripted` - in-process backend double driven by route rules

mod http;
mod scripted;

pub use http::ReqwestTransport;
pub use scripted::ScriptedTransport;

use crate::error::InterceptError;
use crate::message::{InterceptedRequest, InterceptedResponse};
use async_trait::async_trait;

/// Performs a request against the real backend.
///
/// Non-2xx statuses are returned as data; only protocol-level failures are
/// errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &InterceptedRequest)
        -> Result<InterceptedResponse, InterceptError>;
}

//! In-process backend double.
//!
//! Routes are matched newest-first like intercept rules. Every request that
//! reaches the double is logged so tests can assert on what went "over the
//! wire".

use super::Transport;
use crate::error::InterceptError;
use crate::message::{InterceptedRequest, InterceptedResponse};
use crate::pattern::{CompiledRoute, RouteMatcher};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

type Responder =
    Arc<dyn Fn(&InterceptedRequest) -> Result<InterceptedResponse, String> + Send + Sync>;

#[derive(Default)]
pub struct ScriptedTransport {
    routes: RwLock<Vec<(CompiledRoute, Responder)>>,
    sent: Mutex<Vec<InterceptedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching requests with a fixed response.
    pub fn respond(
        &self,
        route: RouteMatcher,
        response: InterceptedResponse,
    ) -> Result<(), InterceptError> {
        self.respond_with(route, move |_| Ok(response.clone()))
    }

    /// Answer matching requests by computing a response from the request.
    pub fn respond_with<F>(&self, route: RouteMatcher, f: F) -> Result<(), InterceptError>
    where
        F: Fn(&InterceptedRequest) -> Result<InterceptedResponse, String> + Send + Sync + 'static,
    {
        let compiled = route.compile()?;
        self.routes.write().push((compiled, Arc::new(f)));
        Ok(())
    }

    /// Fail matching requests at the protocol level.
    pub fn fail(&self, route: RouteMatcher, reason: &str) -> Result<(), InterceptError> {
        let reason = reason.to_string();
        self.respond_with(route, move |_| Err(reason.clone()))
    }

    /// Requests received so far, in arrival order.
    pub fn sent(&self) -> Vec<InterceptedRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &InterceptedRequest,
    ) -> Result<InterceptedResponse, InterceptError> {
        self.sent.lock().push(request.clone());

        let responder = self
            .routes
            .read()
            .iter()
            .rev()
            .find(|(route, _)| route.matches(request))
            .map(|(_, responder)| Arc::clone(responder));

        let Some(responder) = responder else {
            debug!("No scripted route for {} {}", request.method, request.url);
            return Err(InterceptError::Transport {
                method: request.method.clone(),
                url: request.url.clone(),
                reason: "connection refused (no scripted route)".to_string(),
            });
        };

        responder(request).map_err(|reason| InterceptError::Transport {
            method: request.method.clone(),
            url: request.url.clone(),
            reason,
        })
    }
}

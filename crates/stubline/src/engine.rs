//! Interception engine: the composition root for one test.
//!
//! Requests from the application flow through the registry, then the
//! resolver, and finally into the recorder. Requests no rule claims are
//! passed to the real transport untouched and are not recorded.

use crate::config::EngineConfig;
use crate::error::InterceptError;
use crate::fixtures::{DirectoryFixtureSource, Fixture, FixtureSource, FixtureStore};
use crate::message::{DirectRequest, DirectResponse, InterceptedRequest, InterceptedResponse};
use crate::pattern::RouteMatcher;
use crate::recorder::{AliasState, CapturedExchange, ExchangeRecorder, ExchangeStatus};
use crate::registry::{InterceptRule, MatchOutcome, ResponseSource, RuleHandle, RuleRegistry};
use crate::resolver::ResponseResolver;
use crate::transport::{ReqwestTransport, Transport};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a delivered response was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOrigin {
    Intercepted {
        rule: RuleHandle,
        alias: Option<String>,
    },
    /// No rule matched; the real transport answered.
    PassThrough,
}

/// Response handed back to the application under test.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub response: InterceptedResponse,
    pub origin: DeliveryOrigin,
}

impl Delivery {
    pub fn is_intercepted(&self) -> bool {
        matches!(self.origin, DeliveryOrigin::Intercepted { .. })
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub rules: usize,
    pub matched: u64,
    pub passed_through: u64,
    pub failed: u64,
    pub direct: u64,
}

#[derive(Debug, Default)]
struct Counters {
    matched: AtomicU64,
    passed_through: AtomicU64,
    failed: AtomicU64,
    direct: AtomicU64,
}

pub struct InterceptEngine {
    config: EngineConfig,
    registry: RuleRegistry,
    recorder: ExchangeRecorder,
    fixtures: Arc<FixtureStore>,
    transport: Arc<dyn Transport>,
    resolver: ResponseResolver,
    counters: Counters,
}

impl InterceptEngine {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        fixture_source: Arc<dyn FixtureSource>,
    ) -> Self {
        let fixtures = Arc::new(FixtureStore::new(fixture_source));
        let resolver = ResponseResolver::new(Arc::clone(&fixtures), Arc::clone(&transport));
        Self {
            config,
            registry: RuleRegistry::new(),
            recorder: ExchangeRecorder::new(),
            fixtures,
            transport,
            resolver,
            counters: Counters::default(),
        }
    }

    /// Engine backed by the network and the configured fixtures directory.
    pub fn from_config(config: EngineConfig) -> Result<Self, InterceptError> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let fixtures = Arc::new(DirectoryFixtureSource::new(config.fixtures_dir.clone()));
        Ok(Self::new(config, transport, fixtures))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    // ===== Rules & aliases =====

    /// Register an intercept rule. Newer rules shadow older overlapping ones.
    pub fn intercept(
        &self,
        route: RouteMatcher,
        source: ResponseSource,
    ) -> Result<RuleHandle, InterceptError> {
        self.registry.register(route, source)
    }

    /// Register a rule and bind it to `alias` in one step.
    pub fn intercept_as(
        &self,
        route: RouteMatcher,
        source: ResponseSource,
        alias: &str,
    ) -> Result<RuleHandle, InterceptError> {
        let handle = self.intercept(route, source)?;
        self.bind_alias(alias, handle)?;
        Ok(handle)
    }

    pub fn bind_alias(&self, alias: &str, handle: RuleHandle) -> Result<(), InterceptError> {
        if self.registry.get(handle).is_none() {
            return Err(InterceptError::UnknownRule(handle.to_string()));
        }
        self.recorder.bind_alias(alias, handle);
        Ok(())
    }

    // ===== Request path =====

    /// Answer a request issued by the application under test.
    pub async fn handle(&self, request: InterceptedRequest) -> Result<Delivery, InterceptError> {
        match self.registry.resolve_match(&request) {
            MatchOutcome::NoMatch => self.pass_through(request).await,
            MatchOutcome::Matched(rule) => self.intercept_request(rule, request).await,
        }
    }

    async fn pass_through(&self, request: InterceptedRequest) -> Result<Delivery, InterceptError> {
        self.counters.passed_through.fetch_add(1, Ordering::Relaxed);
        info!("Passing {} {} through to the network", request.method, request.url);
        let response = self.transport.send(&request).await?;
        Ok(Delivery {
            response,
            origin: DeliveryOrigin::PassThrough,
        })
    }

    async fn intercept_request(
        &self,
        rule: Arc<InterceptRule>,
        request: InterceptedRequest,
    ) -> Result<Delivery, InterceptError> {
        self.counters.matched.fetch_add(1, Ordering::Relaxed);
        let alias = self.recorder.alias_for(rule.handle);
        let pending = alias.as_deref().map(|alias| self.recorder.begin(alias));

        match self.resolver.resolve(&rule, &request).await {
            Ok(response) => {
                debug!(
                    "{} delivered {} for {} {}",
                    rule.handle, response.status_code, request.method, request.url
                );
                if let Some(pending) = pending {
                    pending.complete(
                        rule.handle,
                        request,
                        Some(response.clone()),
                        ExchangeStatus::Delivered,
                    );
                }
                Ok(Delivery {
                    response,
                    origin: DeliveryOrigin::Intercepted {
                        rule: rule.handle,
                        alias,
                    },
                })
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let err = match alias {
                    Some(ref alias) => err.with_alias(alias),
                    None => err,
                };
                warn!("{} failed to resolve {} {}: {}", rule, request.method, request.url, err);
                if let Some(pending) = pending {
                    pending.complete(rule.handle, request, None, ExchangeStatus::failed(&err));
                }
                Err(err)
            }
        }
    }

    // ===== Waiting =====

    /// Wait for the next exchange under `alias` using the configured timeout.
    pub async fn wait(&self, alias: &str) -> Result<Arc<CapturedExchange>, InterceptError> {
        self.recorder.wait(alias, self.config.wait_timeout()).await
    }

    pub async fn wait_timeout(
        &self,
        alias: &str,
        timeout: Duration,
    ) -> Result<Arc<CapturedExchange>, InterceptError> {
        self.recorder.wait(alias, timeout).await
    }

    /// Most recent exchange under `alias` without consuming it.
    pub fn latest(&self, alias: &str) -> Result<Option<Arc<CapturedExchange>>, InterceptError> {
        self.recorder.latest(alias)
    }

    pub fn alias_state(&self, alias: &str) -> AliasState {
        self.recorder.alias_state(alias)
    }

    pub fn set_alias_value(&self, alias: &str, value: impl Into<Value>) {
        self.recorder.set_value(alias, value.into());
    }

    pub fn alias_value(&self, alias: &str) -> Result<Value, InterceptError> {
        self.recorder.value(alias)
    }

    // ===== Fixtures =====

    pub fn fixture(&self, name: &str) -> Result<Fixture, InterceptError> {
        self.fixtures.load(name)
    }

    /// Mutate a fixture in place; later fixture-backed responses see the change.
    pub fn mutate_fixture<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Value) -> R,
    ) -> Result<R, InterceptError> {
        self.fixtures.mutate(name, f)
    }

    pub fn replace_fixture(&self, name: &str, data: Value) {
        self.fixtures.replace(name, data);
    }

    // ===== Direct requests =====

    /// Real network call that bypasses every intercept rule.
    ///
    /// Non-2xx statuses are errors unless `fail_on_status_code` is false, in
    /// which case the response is returned for manual assertion.
    pub async fn request(&self, direct: DirectRequest) -> Result<DirectResponse, InterceptError> {
        self.counters.direct.fetch_add(1, Ordering::Relaxed);
        let url = self.config.resolve_url(&direct.url);
        let fail_on_status = direct
            .fail_on_status_code
            .unwrap_or(self.config.fail_on_status_code);
        info!("Direct request {} {}", direct.method, url);

        let response = self.transport.send(&direct.to_request(url.clone())).await?;
        if fail_on_status && !response.is_success() {
            warn!(
                "Direct request {} {} returned {}",
                direct.method, url, response.status_code
            );
            return Err(InterceptError::UnexpectedStatus {
                method: direct.method,
                url,
                status: response.status_code,
            });
        }
        debug!("Direct request {} {} -> {}", direct.method, url, response.status_code);
        Ok(response.into())
    }

    // ===== Lifecycle =====

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            rules: self.registry.len(),
            matched: self.counters.matched.load(Ordering::Relaxed),
            passed_through: self.counters.passed_through.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            direct: self.counters.direct.load(Ordering::Relaxed),
        }
    }

    /// Drop every rule, alias, value and loaded fixture.
    pub fn reset(&self) {
        let stats = self.stats();
        info!(
            "Resetting engine: {} rule(s), {} matched, {} passed through, {} failed, {} direct",
            stats.rules, stats.matched, stats.passed_through, stats.failed, stats.direct
        );
        self.registry.clear();
        self.recorder.reset();
        self.fixtures.reset();
    }
}

impl std::fmt::Debug for InterceptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptEngine")
            .field("config", &self.config)
            .field("rules", &self.registry.len())
            .field("fixtures", &self.fixtures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::fixtures::InMemoryFixtureSource;
    use crate::transport::ScriptedTransport;
    use serde_json::json;
    use tracing_test::traced_test;

    const API: &str = "https://conduit-api.bondaracademy.com/api";

    fn engine() -> (InterceptEngine, Arc<ScriptedTransport>) {
        let backend = Arc::new(ScriptedTransport::new());
        let fixtures = InMemoryFixtureSource::new().with("tags", json!({"tags": ["Cypress"]}));
        let config = EngineConfig::default()
            .with_base_url(API)
            .with_wait_timeout(Duration::from_millis(200));
        let engine = InterceptEngine::new(config, backend.clone(), Arc::new(fixtures));
        (engine, backend)
    }

    #[tokio::test]
    async fn test_matched_request_is_recorded_under_alias() {
        let (engine, backend) = engine();
        engine
            .intercept_as(RouteMatcher::path("GET", "tags"), ResponseSource::fixture("tags.json"), "@tags")
            .unwrap();

        let delivery = engine
            .handle(InterceptedRequest::get(format!("{API}/tags")))
            .await
            .unwrap();
        assert!(delivery.is_intercepted());
        assert_eq!(delivery.response.body, json!({"tags": ["Cypress"]}));
        assert_eq!(backend.sent_count(), 0);

        let exchange = engine.wait("tags").await.unwrap();
        assert_eq!(exchange.response().unwrap().body, json!({"tags": ["Cypress"]}));
        assert_eq!(engine.alias_state("tags"), AliasState::Resolved);
    }

    #[tokio::test]
    async fn test_unmatched_request_passes_through() {
        let (engine, backend) = engine();
        backend
            .respond(
                RouteMatcher::any("**/articles/feed*"),
                InterceptedResponse::json(json!({"articles": [{"slug": "real"}], "articlesCount": 1})),
            )
            .unwrap();

        let delivery = engine
            .handle(InterceptedRequest::get(format!("{API}/articles/feed?limit=10&offset=0")))
            .await
            .unwrap();
        assert_eq!(delivery.origin, DeliveryOrigin::PassThrough);
        assert_eq!(delivery.response.body["articlesCount"], json!(1));
        assert_eq!(engine.stats().passed_through, 1);
        assert_eq!(engine.stats().matched, 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_pass_through_and_match_are_logged() {
        let (engine, backend) = engine();
        backend
            .respond(RouteMatcher::any("**"), InterceptedResponse::new(204, json!(null)))
            .unwrap();
        engine
            .intercept_as(RouteMatcher::path("GET", "tags"), ResponseSource::fixture("tags"), "tags")
            .unwrap();

        engine.handle(InterceptedRequest::get(format!("{API}/user"))).await.unwrap();
        engine.handle(InterceptedRequest::get(format!("{API}/tags"))).await.unwrap();

        assert!(logs_contain("through to the network"));
        assert!(logs_contain("@tags #1 recorded"));
    }

    #[tokio::test]
    async fn test_bind_alias_to_unknown_rule() {
        let (engine, _) = engine();
        let handle = engine
            .intercept(RouteMatcher::any("**/x"), ResponseSource::body(json!(null)))
            .unwrap();
        engine.reset();
        let err = engine.bind_alias("x", handle).unwrap_err();
        assert!(matches!(err, InterceptError::UnknownRule(_)));
    }

    #[tokio::test]
    async fn test_handler_failure_uses_bound_alias() {
        let (engine, backend) = engine();
        backend
            .respond(RouteMatcher::any("**/articles"), InterceptedResponse::json(json!({})))
            .unwrap();
        engine
            .intercept_as(
                RouteMatcher::new("POST", "**/articles"),
                ResponseSource::reply(|_| Err(HandlerError::message("bad description"))),
                "postArticles",
            )
            .unwrap();

        let err = engine
            .handle(InterceptedRequest::post(format!("{API}/articles")))
            .await
            .unwrap_err();
        assert!(
            matches!(err, InterceptError::ResolutionFailure { ref alias, .. } if alias == "postArticles")
        );

        let err = engine.wait("postArticles").await.unwrap_err();
        match err {
            InterceptError::ResolutionFailure { alias, reason } => {
                assert_eq!(alias, "postArticles");
                assert_eq!(reason, "bad description");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_live_call_failure_keeps_transport_kind_on_wait() {
        let (engine, backend) = engine();
        backend
            .fail(RouteMatcher::any("**/articles"), "connection reset")
            .unwrap();
        engine
            .intercept_as(
                RouteMatcher::new("POST", "**/articles"),
                ResponseSource::reply(Ok),
                "postArticles",
            )
            .unwrap();

        let err = engine
            .handle(InterceptedRequest::post(format!("{API}/articles")))
            .await
            .unwrap_err();
        assert!(matches!(err, InterceptError::Transport { .. }));

        match engine.wait("postArticles").await.unwrap_err() {
            InterceptError::Transport { method, url, reason } => {
                assert_eq!(method, "POST");
                assert_eq!(url, format!("{API}/articles"));
                assert_eq!(reason, "connection reset");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let latest = engine.latest("postArticles").unwrap().unwrap();
        assert!(matches!(
            latest.status,
            ExchangeStatus::Failed { kind: crate::recorder::FailureKind::Transport, .. }
        ));
    }

    #[tokio::test]
    async fn test_unaliased_failure_still_surfaces() {
        let (engine, _) = engine();
        engine
            .intercept(RouteMatcher::any("**/x"), ResponseSource::fixture("missing"))
            .unwrap();
        let err = engine
            .handle(InterceptedRequest::get(format!("{API}/x")))
            .await
            .unwrap_err();
        assert!(matches!(err, InterceptError::Fixture { .. }));
    }

    #[tokio::test]
    async fn test_direct_request_joins_base_url_and_checks_status() {
        let (engine, backend) = engine();
        backend
            .respond(RouteMatcher::new("GET", "**/articles/gone"), InterceptedResponse::new(404, json!({})))
            .unwrap();
        // Intercept rules never apply to direct requests
        engine
            .intercept(RouteMatcher::any("**/articles/*"), ResponseSource::body(json!("stub")))
            .unwrap();

        let response = engine
            .request(DirectRequest::new("GET", "/articles/gone").fail_on_status_code(false))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(backend.sent()[0].url, format!("{API}/articles/gone"));

        let err = engine
            .request(DirectRequest::new("GET", "/articles/gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, InterceptError::UnexpectedStatus { status: 404, .. }));
        assert_eq!(engine.stats().direct, 2);
        assert_eq!(engine.stats().matched, 0);
    }

    #[tokio::test]
    async fn test_alias_values() {
        let (engine, _) = engine();
        engine.set_alias_value("token", "jwt-123");
        assert_eq!(engine.alias_value("@token").unwrap(), json!("jwt-123"));
        assert!(matches!(
            engine.alias_value("missing"),
            Err(InterceptError::UnknownAlias(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_test_state() {
        let (engine, _) = engine();
        engine
            .intercept_as(RouteMatcher::path("GET", "tags"), ResponseSource::fixture("tags"), "tags")
            .unwrap();
        engine
            .mutate_fixture("tags", |data| data["tags"] = json!([]))
            .unwrap();
        engine.reset();

        assert_eq!(engine.stats().rules, 0);
        assert_eq!(engine.alias_state("tags"), AliasState::Unbound);
        assert_eq!(engine.fixture("tags").unwrap().data, json!({"tags": ["Cypress"]}));
    }
}

//! Response resolution for matched requests.
//!
//! - `Static` payloads are returned verbatim.
//! - `Fixture` sources read the fixture's current (possibly mutated) state.
//! - `Dynamic` handlers get the live upstream response and decide what the
//!   application receives. A failing handler fails the exchange; nothing is
//!   delivered.

mod expect;
mod handler;

pub use expect::{expect_eq, field, set_field};
pub(crate) use handler::ReplyFn;
pub use handler::ResponseHandler;

use crate::error::InterceptError;
use crate::fixtures::FixtureStore;
use crate::message::{InterceptedRequest, InterceptedResponse};
use crate::registry::{InterceptRule, ResponseSource};
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ResponseResolver {
    fixtures: Arc<FixtureStore>,
    transport: Arc<dyn Transport>,
}

impl ResponseResolver {
    pub fn new(fixtures: Arc<FixtureStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            fixtures,
            transport,
        }
    }

    /// Produce the response for a request that matched `rule`.
    pub async fn resolve(
        &self,
        rule: &InterceptRule,
        request: &InterceptedRequest,
    ) -> Result<InterceptedResponse, InterceptError> {
        match &rule.source {
            ResponseSource::Static(payload) => {
                debug!("{} answering with static payload", rule.handle);
                Ok(InterceptedResponse {
                    status_code: payload.status_code,
                    headers: with_json_content_type(payload.headers.clone(), &payload.body),
                    body: payload.body.clone(),
                })
            }
            ResponseSource::Fixture(fixture_ref) => {
                let fixture = self.fixtures.load(&fixture_ref.name)?;
                debug!(
                    "{} answering with fixture '{}'",
                    rule.handle, fixture.name
                );
                Ok(InterceptedResponse {
                    status_code: fixture_ref.status_code.unwrap_or(200),
                    headers: with_json_content_type(fixture_ref.headers.clone(), &fixture.data),
                    body: fixture.data,
                })
            }
            ResponseSource::Dynamic(handler) => {
                let live = self.transport.send(request).await?;
                debug!(
                    "{} handing live {} response to handler",
                    rule.handle, live.status_code
                );
                handler.handle(request, live).map_err(|e| {
                    warn!("Handler for {} rejected the live response: {}", rule, e);
                    InterceptError::ResolutionFailure {
                        alias: rule.route.to_string(),
                        reason: e.to_string(),
                    }
                })
            }
        }
    }
}

fn with_json_content_type(
    mut headers: std::collections::HashMap<String, String>,
    body: &serde_json::Value,
) -> std::collections::HashMap<String, String> {
    let has_content_type = headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type"));
    if !has_content_type && (body.is_object() || body.is_array()) {
        headers.insert("content-type".to_string(), "application/json".to_string());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::fixtures::InMemoryFixtureSource;
    use crate::pattern::RouteMatcher;
    use crate::registry::{MatchOutcome, RuleRegistry};
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    struct Fixture {
        registry: RuleRegistry,
        resolver: ResponseResolver,
        fixtures: Arc<FixtureStore>,
        backend: Arc<ScriptedTransport>,
    }

    fn setup() -> Fixture {
        let fixtures = Arc::new(FixtureStore::new(Arc::new(
            InMemoryFixtureSource::new().with("tags", json!({"tags": ["Cypress"]})),
        )));
        let backend = Arc::new(ScriptedTransport::new());
        Fixture {
            registry: RuleRegistry::new(),
            resolver: ResponseResolver::new(fixtures.clone(), backend.clone()),
            fixtures,
            backend,
        }
    }

    async fn resolve(
        f: &Fixture,
        request: &InterceptedRequest,
    ) -> Result<InterceptedResponse, InterceptError> {
        let MatchOutcome::Matched(rule) = f.registry.resolve_match(request) else {
            panic!("expected a matching rule");
        };
        f.resolver.resolve(&rule, request).await
    }

    #[tokio::test]
    async fn test_static_payload_verbatim() {
        let f = setup();
        f.registry
            .register(RouteMatcher::any("**/feed*"), ResponseSource::body(json!({"articles": [], "articlesCount": 0})))
            .unwrap();
        let res = resolve(&f, &InterceptedRequest::get("http://x.test/api/articles/feed?limit=10"))
            .await
            .unwrap();
        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, json!({"articles": [], "articlesCount": 0}));
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(f.backend.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_static_error_status() {
        let f = setup();
        f.registry
            .register(RouteMatcher::any("**/user"), ResponseSource::status(500, json!("boom")))
            .unwrap();
        let res = resolve(&f, &InterceptedRequest::get("http://x.test/user")).await.unwrap();
        assert_eq!(res.status_code, 500);
        assert_eq!(res.body, json!("boom"));
        assert!(res.header("content-type").is_none());
    }

    #[tokio::test]
    async fn test_fixture_reflects_mutation() {
        let f = setup();
        f.registry
            .register(RouteMatcher::path("GET", "tags"), ResponseSource::fixture("tags.json"))
            .unwrap();
        f.fixtures
            .mutate("tags", |data| data["tags"] = json!(["Cypress", "Test"]))
            .unwrap();
        let res = resolve(&f, &InterceptedRequest::get("http://x.test/api/tags")).await.unwrap();
        assert_eq!(res.body, json!({"tags": ["Cypress", "Test"]}));
    }

    #[tokio::test]
    async fn test_missing_fixture_fails_resolution() {
        let f = setup();
        f.registry
            .register(RouteMatcher::any("**/x"), ResponseSource::fixture("absent"))
            .unwrap();
        let err = resolve(&f, &InterceptedRequest::get("http://x.test/x")).await.unwrap_err();
        assert!(matches!(err, InterceptError::Fixture { .. }));
    }

    #[tokio::test]
    async fn test_dynamic_handler_rewrites_live_response() {
        let f = setup();
        f.backend
            .respond(
                RouteMatcher::new("POST", "**/articles"),
                InterceptedResponse::new(201, json!({"article": {"description": "live"}})),
            )
            .unwrap();
        f.registry
            .register(
                RouteMatcher::new("POST", "**/articles"),
                ResponseSource::reply(|mut res| {
                    expect_eq(&res.body, "article.description", "live")?;
                    set_field(&mut res.body, "article.description", "rewritten")?;
                    Ok(res)
                }),
            )
            .unwrap();

        let res = resolve(&f, &InterceptedRequest::post("http://x.test/api/articles"))
            .await
            .unwrap();
        assert_eq!(res.status_code, 201);
        assert_eq!(res.body["article"]["description"], json!("rewritten"));
        assert_eq!(f.backend.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_handler_failure() {
        let f = setup();
        f.backend
            .respond(RouteMatcher::any("**/articles"), InterceptedResponse::json(json!({})))
            .unwrap();
        f.registry
            .register(
                RouteMatcher::any("**/articles"),
                ResponseSource::reply(|_| Err(HandlerError::message("nope"))),
            )
            .unwrap();
        let err = resolve(&f, &InterceptedRequest::get("http://x.test/articles"))
            .await
            .unwrap_err();
        match err {
            InterceptError::ResolutionFailure { alias, reason } => {
                assert_eq!(alias, "* **/articles");
                assert_eq!(reason, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dynamic_transport_failure_propagates() {
        let f = setup();
        f.registry
            .register(RouteMatcher::any("**/articles"), ResponseSource::reply(Ok))
            .unwrap();
        let err = resolve(&f, &InterceptedRequest::get("http://x.test/articles"))
            .await
            .unwrap_err();
        assert!(matches!(err, InterceptError::Transport { .. }));
    }
}

//! Rule registry and request matcher.
//!
//! Rules are kept in registration order and matched newest-first, so the most
//! recently registered rule wins whenever several patterns overlap.

mod source;

pub use source::{FixtureRef, ResponseSource, StaticPayload};

use crate::error::InterceptError;
use crate::message::InterceptedRequest;
use crate::pattern::{CompiledRoute, RouteMatcher};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Opaque handle to a registered rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct RuleHandle(u64);

impl RuleHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// A registered intercept rule.
#[derive(Debug)]
pub struct InterceptRule {
    pub handle: RuleHandle,
    pub route: RouteMatcher,
    pub source: ResponseSource,
    compiled: CompiledRoute,
}

impl InterceptRule {
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        self.compiled.matches(request)
    }
}

impl fmt::Display for InterceptRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.handle, self.route, self.source.kind())
    }
}

/// Result of looking a request up in the registry.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(Arc<InterceptRule>),
    /// No rule applies; the caller performs the real network call.
    NoMatch,
}

impl MatchOutcome {
    pub fn rule(&self) -> Option<&Arc<InterceptRule>> {
        match self {
            MatchOutcome::Matched(rule) => Some(rule),
            MatchOutcome::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: RwLock<Vec<Arc<InterceptRule>>>,
    next_id: AtomicU64,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and add a rule.
    pub fn register(
        &self,
        route: RouteMatcher,
        source: ResponseSource,
    ) -> Result<RuleHandle, InterceptError> {
        let compiled = route.compile()?;
        let handle = RuleHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let rule = Arc::new(InterceptRule {
            handle,
            route,
            source,
            compiled,
        });
        info!("Registered intercept {}", rule);
        self.rules.write().push(rule);
        Ok(handle)
    }

    /// Find the newest rule whose method and pattern match.
    pub fn resolve_match(&self, request: &InterceptedRequest) -> MatchOutcome {
        let rules = self.rules.read();
        match rules.iter().rev().find(|rule| rule.matches(request)) {
            Some(rule) => {
                debug!("{} {} matched {}", request.method, request.url, rule.handle);
                MatchOutcome::Matched(Arc::clone(rule))
            }
            None => {
                debug!("{} {} matched no rule", request.method, request.url);
                MatchOutcome::NoMatch
            }
        }
    }

    pub fn get(&self, handle: RuleHandle) -> Option<Arc<InterceptRule>> {
        self.rules
            .read()
            .iter()
            .find(|rule| rule.handle == handle)
            .cloned()
    }

    /// Snapshot in registration order.
    pub fn rules(&self) -> Vec<Arc<InterceptRule>> {
        self.rules.read().clone()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }
}

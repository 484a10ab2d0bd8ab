//! Exchange recorder and the alias/wait primitive.
//!
//! Each alias keeps its most recent exchange plus the newest one no wait has
//! consumed yet. `wait` takes the unconsumed exchange, or suspends until the
//! next one is recorded. Exchanges still in flight when a wait times out are
//! tracked by ticket: they are recorded when they resolve but never satisfy
//! a later wait, and never displace a fresher unconsumed exchange.

mod types;

pub use types::{AliasState, CapturedExchange, ExchangeStatus, FailureKind};

use crate::error::InterceptError;
use crate::message::{InterceptedRequest, InterceptedResponse};
use crate::registry::RuleHandle;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct AliasSlot {
    latest: Option<Arc<CapturedExchange>>,
    unconsumed: Option<Arc<CapturedExchange>>,
    generation: u64,
    next_ticket: u64,
    in_flight: HashSet<u64>,
    /// Tickets still in flight when a wait on this alias timed out.
    orphaned: HashSet<u64>,
}

#[derive(Debug, Default)]
struct RecorderState {
    bindings: HashMap<RuleHandle, String>,
    slots: HashMap<String, AliasSlot>,
    values: HashMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct ExchangeRecorder {
    state: Mutex<RecorderState>,
    notify: Notify,
}

/// Accept both `postArticles` and `@postArticles`.
pub fn normalize_alias(alias: &str) -> String {
    alias.trim().trim_start_matches('@').to_string()
}

impl ExchangeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate future resolutions of `handle` with `alias`.
    pub fn bind_alias(&self, alias: &str, handle: RuleHandle) {
        let alias = normalize_alias(alias);
        let mut state = self.state.lock();
        if let Some(previous) = state.bindings.insert(handle, alias.clone()) {
            if previous != alias {
                debug!("{} re-bound from @{} to @{}", handle, previous, alias);
            }
        }
        state.slots.entry(alias.clone()).or_default();
        info!("Alias @{} bound to {}", alias, handle);
    }

    pub fn alias_for(&self, handle: RuleHandle) -> Option<String> {
        self.state.lock().bindings.get(&handle).cloned()
    }

    /// Mark a matched request as in flight for `alias`.
    pub fn begin(&self, alias: &str) -> PendingExchange<'_> {
        let alias = normalize_alias(alias);
        let ticket = {
            let mut state = self.state.lock();
            let slot = state.slots.entry(alias.clone()).or_default();
            slot.next_ticket += 1;
            slot.in_flight.insert(slot.next_ticket);
            slot.next_ticket
        };
        PendingExchange {
            recorder: self,
            alias,
            ticket,
            settled: false,
        }
    }

    /// Store an exchange under `alias` without a preceding [`begin`](Self::begin).
    pub fn record(
        &self,
        alias: &str,
        rule: RuleHandle,
        request: InterceptedRequest,
        response: Option<InterceptedResponse>,
        status: ExchangeStatus,
    ) -> Arc<CapturedExchange> {
        self.store(&normalize_alias(alias), rule, request, response, status, None)
    }

    fn store(
        &self,
        alias: &str,
        rule: RuleHandle,
        request: InterceptedRequest,
        response: Option<InterceptedResponse>,
        status: ExchangeStatus,
        ticket: Option<u64>,
    ) -> Arc<CapturedExchange> {
        let exchange = {
            let mut state = self.state.lock();
            let slot = state.slots.entry(alias.to_string()).or_default();
            let orphaned = match ticket {
                Some(ticket) => {
                    slot.in_flight.remove(&ticket);
                    slot.orphaned.remove(&ticket)
                }
                None => false,
            };
            slot.generation += 1;

            let exchange = Arc::new(CapturedExchange {
                alias: alias.to_string(),
                rule,
                sequence: slot.generation,
                request,
                response,
                status,
                captured_at: chrono::Utc::now(),
            });
            slot.latest = Some(Arc::clone(&exchange));

            if orphaned {
                debug!(
                    "@{} #{} resolved after its wait timed out; not observable",
                    alias, exchange.sequence
                );
            } else {
                slot.unconsumed = Some(Arc::clone(&exchange));
            }
            exchange
        };

        match &exchange.status {
            ExchangeStatus::Delivered => info!(
                "@{} #{} recorded ({} {} -> {:?})",
                alias,
                exchange.sequence,
                exchange.request.method,
                exchange.request.url,
                exchange.status_code()
            ),
            ExchangeStatus::Failed { reason, .. } => warn!(
                "@{} #{} recorded as failed: {}",
                alias, exchange.sequence, reason
            ),
        }
        self.notify.notify_waiters();
        exchange
    }

    fn abandon(&self, alias: &str, ticket: u64) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slots.get_mut(alias) {
            slot.in_flight.remove(&ticket);
            slot.orphaned.remove(&ticket);
        }
    }

    /// Suspend until an unconsumed exchange exists for `alias`, then consume it.
    ///
    /// Fails with `Timeout` when nothing arrives within `timeout`, with the
    /// stored error when the exchange failed, and with `UnknownAlias` when
    /// the alias was never bound.
    pub async fn wait(
        &self,
        alias: &str,
        timeout: Duration,
    ) -> Result<Arc<CapturedExchange>, InterceptError> {
        let alias = normalize_alias(alias);
        let deadline = tokio::time::Instant::now() + timeout;
        debug!("Waiting up to {:?} for @{}", timeout, alias);

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent record cannot be missed
            notified.as_mut().enable();

            if let Some(result) = self.take_unconsumed(&alias)? {
                return result;
            }

            if tokio::time::timeout_at(deadline, notified.as_mut())
                .await
                .is_err()
            {
                return self.expire(&alias, timeout);
            }
        }
    }

    fn take_unconsumed(
        &self,
        alias: &str,
    ) -> Result<Option<Result<Arc<CapturedExchange>, InterceptError>>, InterceptError> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .get_mut(alias)
            .ok_or_else(|| InterceptError::UnknownAlias(alias.to_string()))?;

        Ok(slot.unconsumed.take().map(Self::observe))
    }

    fn expire(
        &self,
        alias: &str,
        timeout: Duration,
    ) -> Result<Arc<CapturedExchange>, InterceptError> {
        {
            let mut state = self.state.lock();
            let slot = state
                .slots
                .get_mut(alias)
                .ok_or_else(|| InterceptError::UnknownAlias(alias.to_string()))?;
            // An exchange may have landed between the deadline and this lock
            if let Some(exchange) = slot.unconsumed.take() {
                return Self::observe(exchange);
            }
            slot.orphaned.extend(slot.in_flight.iter().copied());
        }
        warn!("Timed out after {:?} waiting for @{}", timeout, alias);
        Err(InterceptError::Timeout {
            alias: alias.to_string(),
            waited: timeout,
        })
    }

    fn observe(exchange: Arc<CapturedExchange>) -> Result<Arc<CapturedExchange>, InterceptError> {
        exchange.response()?;
        Ok(exchange)
    }

    /// Most recent exchange for `alias`, without consuming it.
    pub fn latest(&self, alias: &str) -> Result<Option<Arc<CapturedExchange>>, InterceptError> {
        let alias = normalize_alias(alias);
        let state = self.state.lock();
        state
            .slots
            .get(&alias)
            .map(|slot| slot.latest.clone())
            .ok_or(InterceptError::UnknownAlias(alias))
    }

    pub fn alias_state(&self, alias: &str) -> AliasState {
        let alias = normalize_alias(alias);
        let state = self.state.lock();
        match state.slots.get(&alias) {
            None => AliasState::Unbound,
            Some(slot) if !slot.in_flight.is_empty() || slot.latest.is_none() => {
                AliasState::AwaitingMatch
            }
            Some(_) => AliasState::Resolved,
        }
    }

    /// Store an arbitrary value under an alias (e.g. an auth token).
    pub fn set_value(&self, alias: &str, value: Value) {
        let alias = normalize_alias(alias);
        debug!("Value alias @{} set", alias);
        self.state.lock().values.insert(alias, value);
    }

    pub fn value(&self, alias: &str) -> Result<Value, InterceptError> {
        let alias = normalize_alias(alias);
        self.state
            .lock()
            .values
            .get(&alias)
            .cloned()
            .ok_or(InterceptError::UnknownAlias(alias))
    }

    /// Names of all bound exchange aliases.
    pub fn aliases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().slots.keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget every binding, exchange, and value. Called at the test boundary.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = RecorderState::default();
    }
}

/// A matched request whose resolution is still running.
///
/// Dropping it without [`complete`](Self::complete) (e.g. the request future
/// was cancelled) releases the in-flight slot.
#[must_use]
pub struct PendingExchange<'a> {
    recorder: &'a ExchangeRecorder,
    alias: String,
    ticket: u64,
    settled: bool,
}

impl PendingExchange<'_> {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn complete(
        mut self,
        rule: RuleHandle,
        request: InterceptedRequest,
        response: Option<InterceptedResponse>,
        status: ExchangeStatus,
    ) -> Arc<CapturedExchange> {
        self.settled = true;
        self.recorder
            .store(&self.alias, rule, request, response, status, Some(self.ticket))
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.recorder.abandon(&self.alias, self.ticket);
        }
    }
}

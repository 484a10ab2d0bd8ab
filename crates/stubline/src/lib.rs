//! Deterministic network interception for end-to-end tests.
//!
//! Declare how requests are answered (inline payload, fixture, or a handler
//! over the live response), let unmatched traffic pass through, and wait on
//! named exchanges before asserting on them.

// ===== Matching & resolution =====
pub mod message;
pub mod pattern;
pub mod registry;
pub mod resolver;

// ===== Test-scoped state =====
pub mod fixtures;
pub mod recorder;

// ===== Wiring =====
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod suite;
pub mod transport;

pub use config::{EngineConfig, RuleFile};
pub use engine::{Delivery, DeliveryOrigin, EngineStats, InterceptEngine};
pub use error::{HandlerError, InterceptError};
pub use message::{DirectRequest, DirectResponse, InterceptedRequest, InterceptedResponse};
pub use pattern::RouteMatcher;
pub use recorder::{AliasState, CapturedExchange};
pub use registry::{ResponseSource, RuleHandle};
pub use suite::Suite;

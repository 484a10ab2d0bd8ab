//! Where a matched request's response comes from.

use crate::error::HandlerError;
use crate::message::{InterceptedRequest, InterceptedResponse};
use crate::resolver::{ReplyFn, ResponseHandler};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Inline response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticPayload {
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default = "default_status")]
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_status() -> u16 {
    200
}

/// Named fixture, read at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Clone)]
pub enum ResponseSource {
    Static(StaticPayload),
    Fixture(FixtureRef),
    /// Performs the real call and hands the live response to the handler.
    Dynamic(Arc<dyn ResponseHandler>),
}

impl ResponseSource {
    /// Inline body with status 200.
    pub fn body(body: serde_json::Value) -> Self {
        ResponseSource::Static(StaticPayload {
            body,
            status_code: default_status(),
            headers: HashMap::new(),
        })
    }

    pub fn status(status_code: u16, body: serde_json::Value) -> Self {
        ResponseSource::Static(StaticPayload {
            body,
            status_code,
            headers: HashMap::new(),
        })
    }

    pub fn fixture(name: impl Into<String>) -> Self {
        ResponseSource::Fixture(FixtureRef {
            name: name.into(),
            status_code: None,
            headers: HashMap::new(),
        })
    }

    /// Handler receiving the outgoing request and the live response.
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&InterceptedRequest, InterceptedResponse) -> Result<InterceptedResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        ResponseSource::Dynamic(Arc::new(f))
    }

    /// Handler receiving only the live response.
    pub fn reply<F>(f: F) -> Self
    where
        F: Fn(InterceptedResponse) -> Result<InterceptedResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        ResponseSource::Dynamic(Arc::new(ReplyFn(f)))
    }

    /// Override the status of a static or fixture source.
    pub fn with_status(mut self, status_code: u16) -> Self {
        match &mut self {
            ResponseSource::Static(payload) => payload.status_code = status_code,
            ResponseSource::Fixture(fixture) => fixture.status_code = Some(status_code),
            ResponseSource::Dynamic(_) => {}
        }
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let (name, value) = (name.to_lowercase(), value.into());
        match &mut self {
            ResponseSource::Static(payload) => {
                payload.headers.insert(name, value);
            }
            ResponseSource::Fixture(fixture) => {
                fixture.headers.insert(name, value);
            }
            ResponseSource::Dynamic(_) => {}
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResponseSource::Static(_) => "static",
            ResponseSource::Fixture(_) => "fixture",
            ResponseSource::Dynamic(_) => "handler",
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ResponseSource::Dynamic(_))
    }
}

impl fmt::Debug for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Static(payload) => f.debug_tuple("Static").field(payload).finish(),
            ResponseSource::Fixture(fixture) => f.debug_tuple("Fixture").field(fixture).finish(),
            ResponseSource::Dynamic(_) => f.write_str("Dynamic(<handler>)"),
        }
    }
}

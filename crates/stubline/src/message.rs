//! Request and response values exchanged between the application under test,
//! the engine, and the real transport.
//!
//! Bodies are carried as `serde_json::Value`: JSON payloads stay structured,
//! anything else is kept as `Value::String`, and an empty body is `Value::Null`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An outgoing request issued by the application under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl InterceptedRequest {
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_uppercase(),
            url: url.into(),
            headers: HashMap::new(),
            body: serde_json::Value::Null,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// Add a header. Names are stored lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.headers
            .entry("content-type".to_string())
            .or_insert_with(|| "application/json".to_string());
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Path component of the URL (`/api/articles`).
    pub fn path(&self) -> String {
        split_url(&self.url).0
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<String> {
        split_url(&self.url).1
    }

    pub fn query_map(&self) -> HashMap<String, String> {
        self.query()
            .map(|q| parse_query_string(&q))
            .unwrap_or_default()
    }
}

/// A response delivered to the application under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedResponse {
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
}

fn default_status_code() -> u16 {
    200
}

impl Default for InterceptedResponse {
    fn default() -> Self {
        Self {
            status_code: default_status_code(),
            headers: HashMap::new(),
            body: serde_json::Value::Null,
        }
    }
}

impl InterceptedResponse {
    pub fn new(status_code: u16, body: serde_json::Value) -> Self {
        Self {
            status_code,
            body,
            ..Default::default()
        }
    }

    pub fn json(body: serde_json::Value) -> Self {
        Self::new(200, body).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Out-of-band request that bypasses every intercept rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Overrides the engine-wide default when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on_status_code: Option<bool>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl DirectRequest {
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.as_ref().to_uppercase(),
            headers: HashMap::new(),
            body: None,
            fail_on_status_code: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    /// Conduit-style `Authorization: Token <token>` header.
    pub fn with_token(self, token: &str) -> Self {
        self.with_header("authorization", format!("Token {token}"))
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.headers
            .entry("content-type".to_string())
            .or_insert_with(|| "application/json".to_string());
        self.body = Some(body);
        self
    }

    pub fn fail_on_status_code(mut self, fail: bool) -> Self {
        self.fail_on_status_code = Some(fail);
        self
    }

    pub(crate) fn to_request(&self, url: String) -> InterceptedRequest {
        InterceptedRequest {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: self.body.clone().unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Result of a direct request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl From<InterceptedResponse> for DirectResponse {
    fn from(response: InterceptedResponse) -> Self {
        Self {
            status: response.status_code,
            headers: response.headers,
            body: response.body,
        }
    }
}

/// Decode raw body bytes. JSON is parsed when the content type says so or the
/// payload looks like a JSON document; anything else becomes a string.
pub fn body_from_bytes(bytes: &[u8], content_type: Option<&str>) -> serde_json::Value {
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }

    let declared_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);
    let looks_json = matches!(
        bytes.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'{') | Some(b'[')
    );

    if declared_json || looks_json {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return value;
        }
    }
    serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
}

/// Encode a body for the wire. Strings are sent verbatim.
pub fn body_to_bytes(body: &serde_json::Value) -> Vec<u8> {
    match body {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::String(s) => s.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    }
}

/// Parse a query string into a map, URL-decoding keys and values.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decoded_key = urlencoding::decode(key).unwrap_or_default().into_owned();
            let decoded_value = urlencoding::decode(value).unwrap_or_default().into_owned();
            (decoded_key, decoded_value)
        })
        .collect()
}

/// Split a URL into (path, query). Relative URLs are treated as path-and-query.
pub(crate) fn split_url(url: &str) -> (String, Option<String>) {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        return (parsed.path().to_string(), parsed.query().map(str::to_string));
    }
    let without_fragment = url.split('#').next().unwrap_or(url);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (without_fragment.to_string(), None),
    }
}

fn header_lookup<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

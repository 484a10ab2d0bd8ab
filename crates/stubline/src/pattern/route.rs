//! Route matchers: HTTP method plus URL or path glob.

use super::glob::CompiledUrlPattern;
use crate::error::InterceptError;
use crate::message::InterceptedRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Method part of a route: a concrete verb or `*`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MethodMatcher {
    #[default]
    Any,
    Exact(String),
}

impl MethodMatcher {
    pub fn matches(&self, method: &str) -> bool {
        match self {
            MethodMatcher::Any => true,
            MethodMatcher::Exact(expected) => expected.eq_ignore_ascii_case(method),
        }
    }
}

impl From<String> for MethodMatcher {
    fn from(value: String) -> Self {
        MethodMatcher::from(value.as_str())
    }
}

impl From<&str> for MethodMatcher {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "*" {
            MethodMatcher::Any
        } else {
            MethodMatcher::Exact(trimmed.to_uppercase())
        }
    }
}

impl From<MethodMatcher> for String {
    fn from(value: MethodMatcher) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodMatcher::Any => f.write_str("*"),
            MethodMatcher::Exact(m) => f.write_str(m),
        }
    }
}

/// Declarative route: `{method, url}` or `{method, path}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatcher {
    #[serde(default)]
    pub method: MethodMatcher,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RouteMatcher {
    /// Match on method and a URL glob.
    pub fn new(method: impl Into<MethodMatcher>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: Some(url.into()),
            path: None,
        }
    }

    /// Match on method and a path glob.
    pub fn path(method: impl Into<MethodMatcher>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: None,
            path: Some(path.into()),
        }
    }

    /// Any method, URL glob.
    pub fn any(url: impl Into<String>) -> Self {
        Self::new(MethodMatcher::Any, url)
    }

    pub fn compile(&self) -> Result<CompiledRoute, InterceptError> {
        let pattern = match (&self.url, &self.path) {
            (Some(url), None) => CompiledUrlPattern::url(url)?,
            (None, Some(path)) => CompiledUrlPattern::path(path)?,
            (Some(url), Some(_)) => {
                return Err(InterceptError::InvalidPattern {
                    pattern: url.clone(),
                    reason: "route sets both 'url' and 'path'".to_string(),
                })
            }
            (None, None) => CompiledUrlPattern::url("**")?,
        };
        Ok(CompiledRoute {
            method: self.method.clone(),
            pattern,
        })
    }
}

impl fmt::Display for RouteMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self
            .url
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or("**");
        write!(f, "{} {}", self.method, target)
    }
}

/// A route ready for request matching.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRoute {
    pub method: MethodMatcher,
    pub pattern: CompiledUrlPattern,
}

impl CompiledRoute {
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        self.method.matches(&request.method) && self.pattern.matches(&request.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_matcher_parse() {
        assert_eq!(MethodMatcher::from("*"), MethodMatcher::Any);
        assert_eq!(MethodMatcher::from(""), MethodMatcher::Any);
        assert_eq!(
            MethodMatcher::from("post"),
            MethodMatcher::Exact("POST".to_string())
        );
        assert!(MethodMatcher::from("GET").matches("get"));
        assert!(!MethodMatcher::from("GET").matches("POST"));
        assert!(MethodMatcher::Any.matches("DELETE"));
    }

    #[test]
    fn test_route_matches_method_and_url() {
        let route = RouteMatcher::new("POST", "**/articles").compile().unwrap();
        let post = InterceptedRequest::post("https://api.example.com/api/articles");
        let get = InterceptedRequest::get("https://api.example.com/api/articles");
        assert!(route.matches(&post));
        assert!(!route.matches(&get));
    }

    #[test]
    fn test_route_serde_object_form() {
        let json = r#"{"method": "GET", "path": "tags"}"#;
        let route: RouteMatcher = serde_json::from_str(json).unwrap();
        assert_eq!(route.method, MethodMatcher::Exact("GET".to_string()));
        assert_eq!(route.path.as_deref(), Some("tags"));
        let compiled = route.compile().unwrap();
        assert!(compiled.matches(&InterceptedRequest::get("https://x.test/api/tags")));
    }

    #[test]
    fn test_route_without_method_matches_any() {
        let route: RouteMatcher = serde_json::from_str(r#"{"url": "**/feed"}"#).unwrap();
        assert_eq!(route.method, MethodMatcher::Any);
        assert_eq!(route.to_string(), "* **/feed");
    }

    #[test]
    fn test_route_with_url_and_path_is_invalid() {
        let route = RouteMatcher {
            method: MethodMatcher::Any,
            url: Some("**/a".to_string()),
            path: Some("/a".to_string()),
        };
        assert!(route.compile().is_err());
    }
}

//! Compiled URL glob patterns.
//!
//! `*` matches within one path segment, `**` matches any remainder including
//! `/`. A query string on the request is ignored unless the pattern itself
//! contains a `?`.

use crate::error::InterceptError;
use crate::message::split_url;
use regex::Regex;
use std::sync::Arc;

/// Which part of the request URL a pattern is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternScope {
    /// Scheme, host, path (and query when the pattern has one).
    FullUrl,
    /// Path (and query when the pattern has one).
    PathAndQuery,
    /// Literal fragment without wildcards: substring of the path or URL.
    Fragment,
}

/// A glob compiled once at registration time.
#[derive(Debug, Clone)]
pub struct CompiledUrlPattern {
    raw: String,
    regex: Arc<Regex>,
    scope: PatternScope,
    includes_query: bool,
}

impl CompiledUrlPattern {
    /// Compile a pattern matched against the request URL.
    ///
    /// Patterns starting with `/` are matched against the path; bare literals
    /// like `tags` match as a substring; everything else sees the full URL.
    pub fn url(pattern: &str) -> Result<Self, InterceptError> {
        let scope = if pattern.starts_with('/') {
            PatternScope::PathAndQuery
        } else if is_fragment(pattern) {
            PatternScope::Fragment
        } else {
            PatternScope::FullUrl
        };
        Self::compile(pattern, scope)
    }

    /// Compile a pattern matched against the request path only.
    pub fn path(pattern: &str) -> Result<Self, InterceptError> {
        let scope = if is_fragment(pattern) {
            PatternScope::Fragment
        } else {
            PatternScope::PathAndQuery
        };
        Self::compile(pattern, scope)
    }

    fn compile(pattern: &str, scope: PatternScope) -> Result<Self, InterceptError> {
        if pattern.is_empty() {
            return Err(InterceptError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
            InterceptError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            raw: pattern.to_string(),
            regex: Arc::new(regex),
            scope,
            includes_query: pattern.contains('?'),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scope(&self) -> PatternScope {
        self.scope
    }

    /// Check whether a request URL matches.
    pub fn matches(&self, url: &str) -> bool {
        match self.scope {
            PatternScope::FullUrl => {
                let target = if self.includes_query {
                    strip_fragment(url)
                } else {
                    strip_query(url)
                };
                self.regex.is_match(target)
            }
            PatternScope::PathAndQuery => {
                let (path, query) = split_url(url);
                let target = match (self.includes_query, query) {
                    (true, Some(q)) => format!("{path}?{q}"),
                    _ => path,
                };
                self.regex.is_match(&target)
            }
            PatternScope::Fragment => {
                let target = if self.includes_query {
                    strip_fragment(url)
                } else {
                    strip_query(url)
                };
                target.contains(self.raw.as_str())
            }
        }
    }
}

impl PartialEq for CompiledUrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.scope == other.scope
    }
}

fn is_fragment(pattern: &str) -> bool {
    !pattern.contains('*') && !pattern.starts_with('/') && !pattern.contains("://")
}

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

/// Translate a glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    let mut literal = String::new();
    while let Some(c) = chars.next() {
        if c != '*' {
            literal.push(c);
            continue;
        }
        out.push_str(&regex::escape(&literal));
        literal.clear();
        if chars.peek() == Some(&'*') {
            chars.next();
            // Collapse runs like `***`
            while chars.peek() == Some(&'*') {
                chars.next();
            }
            out.push_str(".*");
        } else {
            out.push_str("[^/]*");
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: &str = "https://conduit-api.bondaracademy.com/api";

    #[test]
    fn test_double_star_matches_any_prefix() {
        let pattern = CompiledUrlPattern::url("**/articles").unwrap();
        assert_eq!(pattern.scope(), PatternScope::FullUrl);
        assert!(pattern.matches(&format!("{API}/articles")));
        assert!(pattern.matches(&format!("{API}/articles?limit=10")));
        assert!(!pattern.matches(&format!("{API}/articles/feed")));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = CompiledUrlPattern::url(&format!("{API}/articles*")).unwrap();
        assert!(pattern.matches(&format!("{API}/articles")));
        assert!(pattern.matches(&format!("{API}/articles?limit=10&offset=0")));
        assert!(!pattern.matches(&format!("{API}/articles/feed")));

        let feed = CompiledUrlPattern::url(&format!("{API}/articles/feed*")).unwrap();
        assert!(feed.matches(&format!("{API}/articles/feed?limit=10")));
        assert!(!feed.matches(&format!("{API}/articles")));
    }

    #[test]
    fn test_query_in_pattern_is_enforced() {
        let pattern = CompiledUrlPattern::url("**/articles?limit=10").unwrap();
        assert!(pattern.matches(&format!("{API}/articles?limit=10")));
        assert!(!pattern.matches(&format!("{API}/articles?limit=20")));
        assert!(!pattern.matches(&format!("{API}/articles")));
    }

    #[test]
    fn test_path_scope() {
        let pattern = CompiledUrlPattern::url("/api/articles/*/favorite").unwrap();
        assert_eq!(pattern.scope(), PatternScope::PathAndQuery);
        assert!(pattern.matches(&format!("{API}/articles/my-slug/favorite")));
        assert!(!pattern.matches(&format!("{API}/articles/a/b/favorite")));
        assert!(pattern.matches("/api/articles/x/favorite?y=1"));
    }

    #[test]
    fn test_fragment_matches_as_substring() {
        let pattern = CompiledUrlPattern::path("tags").unwrap();
        assert_eq!(pattern.scope(), PatternScope::Fragment);
        assert!(pattern.matches(&format!("{API}/tags")));
        assert!(!pattern.matches(&format!("{API}/articles?tag=x")));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = CompiledUrlPattern::url("/api/v1.0/items+all").unwrap();
        assert!(pattern.matches("/api/v1.0/items+all"));
        assert!(!pattern.matches("/api/v1x0/items+all"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = CompiledUrlPattern::url("").unwrap_err();
        assert!(matches!(err, InterceptError::InvalidPattern { .. }));
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("**/a"), "^.*/a$");
        assert_eq!(glob_to_regex("/a/*"), "^/a/[^/]*$");
        assert_eq!(glob_to_regex("/a/***"), "^/a/.*$");
    }
}

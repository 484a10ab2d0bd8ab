//! Declarative intercept rules file.
//!
//! ```yaml
//! rules:
//!   - method: GET
//!     path: tags
//!     alias: tags
//!     response:
//!       fixture: tags.json
//!   - method: GET
//!     url: "**/articles/feed*"
//!     response:
//!       body: { articles: [], articlesCount: 0 }
//!       statusCode: 200
//! ```
//!
//! Handlers are code and cannot be declared here.

use crate::engine::InterceptEngine;
use crate::pattern::RouteMatcher;
use crate::registry::{FixtureRef, ResponseSource, RuleHandle, RuleRegistry, StaticPayload};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub route: RouteMatcher,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub response: ResponseSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl ResponseSpec {
    pub fn to_source(&self) -> Result<ResponseSource, anyhow::Error> {
        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        match (&self.body, &self.fixture) {
            (Some(_), Some(fixture)) => anyhow::bail!(
                "response sets both 'body' and 'fixture' ('{fixture}'); use one"
            ),
            (_, Some(fixture)) => Ok(ResponseSource::Fixture(FixtureRef {
                name: fixture.clone(),
                status_code: self.status_code,
                headers,
            })),
            (body, None) => Ok(ResponseSource::Static(StaticPayload {
                body: body.clone().unwrap_or(serde_json::Value::Null),
                status_code: self.status_code.unwrap_or(200),
                headers,
            })),
        }
    }
}

impl RuleFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {}", path.display()))?;
        let file: RuleFile = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse rules file {}", path.display()))?;
        file.validate()?;
        Ok(file)
    }

    /// Every route compiles and every response names exactly one source.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (index, rule) in self.rules.iter().enumerate() {
            rule.route
                .compile()
                .with_context(|| format!("rules[{index}] ({})", rule.route))?;
            rule.response
                .to_source()
                .with_context(|| format!("rules[{index}] ({})", rule.route))?;
        }
        Ok(())
    }

    /// Fixture names referenced by any rule, in file order, without duplicates.
    pub fn fixture_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if let Some(ref fixture) = rule.response.fixture {
                if !names.contains(&fixture.as_str()) {
                    names.push(fixture);
                }
            }
        }
        names
    }

    /// Register every rule in a bare registry. Handles are returned in file order.
    pub fn load_into(&self, registry: &RuleRegistry) -> Result<Vec<RuleHandle>, anyhow::Error> {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let source = rule.response.to_source()?;
                registry
                    .register(rule.route.clone(), source)
                    .with_context(|| format!("rules[{index}] ({})", rule.route))
            })
            .collect()
    }

    /// Register every rule with an engine and bind declared aliases.
    pub fn install(&self, engine: &InterceptEngine) -> Result<Vec<RuleHandle>, anyhow::Error> {
        let mut handles = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            let source = rule.response.to_source()?;
            let handle = engine
                .intercept(rule.route.clone(), source)
                .with_context(|| format!("rules[{index}] ({})", rule.route))?;
            if let Some(ref alias) = rule.alias {
                engine.bind_alias(alias, handle)?;
            }
            handles.push(handle);
        }
        Ok(handles)
    }
}

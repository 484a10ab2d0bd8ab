use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Backend that loads named fixture documents.
///
/// Synchronous on purpose: fixtures are small JSON files read once per test.
pub trait FixtureSource: Send + Sync {
    /// Load the fixture with the given (normalized) name.
    fn load(&self, name: &str) -> Result<Value>;
}

/// Strip a trailing `.json` and leading `./` so `tags.json` and `tags` are
/// the same fixture.
pub fn normalize_fixture_name(name: &str) -> String {
    let trimmed = name.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.strip_suffix(".json").unwrap_or(trimmed).to_string()
}

/// Loads `<root>/<name>.json` from disk.
#[derive(Debug, Clone)]
pub struct DirectoryFixtureSource {
    root: PathBuf,
}

impl DirectoryFixtureSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", normalize_fixture_name(name)))
    }
}

impl FixtureSource for DirectoryFixtureSource {
    fn load(&self, name: &str) -> Result<Value> {
        let path = self.path_for(name);
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read fixture file {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Fixture file {} is not valid JSON", path.display()))?;
        tracing::debug!("Loaded fixture '{}' from {}", name, path.display());
        Ok(value)
    }
}

/// Fixtures held in memory, for tests and programmatic setups.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFixtureSource {
    fixtures: HashMap<String, Value>,
}

impl InMemoryFixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, data: Value) -> Self {
        self.fixtures.insert(normalize_fixture_name(name), data);
        self
    }
}

impl FixtureSource for InMemoryFixtureSource {
    fn load(&self, name: &str) -> Result<Value> {
        self.fixtures
            .get(&normalize_fixture_name(name))
            .cloned()
            .with_context(|| format!("No fixture named '{name}'"))
    }
}

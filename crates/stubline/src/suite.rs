//! Per-test lifecycle.
//!
//! A [`Suite`] builds a fresh [`InterceptEngine`] for every test, runs the
//! before-each hooks against it, runs the test body and tears the engine
//! down. Rules, aliases and fixture mutations never outlive one test.

use crate::config::EngineConfig;
use crate::engine::InterceptEngine;
use crate::error::InterceptError;
use crate::fixtures::{DirectoryFixtureSource, FixtureSource};
use crate::transport::{ReqwestTransport, Transport};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

type Hook =
    Arc<dyn Fn(Arc<InterceptEngine>) -> BoxFuture<'static, Result<(), InterceptError>> + Send + Sync>;

pub struct Suite {
    name: String,
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    fixture_source: Arc<dyn FixtureSource>,
    hooks: Vec<Hook>,
}

impl Suite {
    pub fn new(
        name: impl Into<String>,
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        fixture_source: Arc<dyn FixtureSource>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            transport,
            fixture_source,
            hooks: Vec::new(),
        }
    }

    /// Suite backed by the network and the configured fixtures directory.
    pub fn from_config(name: impl Into<String>, config: EngineConfig) -> Result<Self, InterceptError> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let fixtures = Arc::new(DirectoryFixtureSource::new(config.fixtures_dir.clone()));
        Ok(Self::new(name, config, transport, fixtures))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a hook run against each fresh engine, in registration order.
    pub fn before_each<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<InterceptEngine>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), InterceptError>> + Send + 'static,
    {
        self.hooks.push(Arc::new(move |engine| hook(engine).boxed()));
        self
    }

    /// A new engine sharing this suite's transport and pristine fixture source.
    pub fn new_engine(&self) -> Arc<InterceptEngine> {
        Arc::new(InterceptEngine::new(
            self.config.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.fixture_source),
        ))
    }

    /// Run one test against its own engine.
    ///
    /// A failing hook skips the body. The engine is reset afterwards either way.
    pub async fn run<T, E, F, Fut>(&self, test: &str, body: F) -> Result<T, E>
    where
        F: FnOnce(Arc<InterceptEngine>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<InterceptError>,
    {
        let span = info_span!("test", suite = %self.name, test = %test);
        async {
            let engine = self.new_engine();
            info!("Starting");

            let result = match self.run_hooks(&engine).await {
                Ok(()) => body(Arc::clone(&engine)).await,
                Err(e) => {
                    error!("before_each hook failed: {}", e);
                    Err(E::from(e))
                }
            };

            engine.reset();
            match &result {
                Ok(_) => info!("Passed"),
                Err(_) => error!("Failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_hooks(&self, engine: &Arc<InterceptEngine>) -> Result<(), InterceptError> {
        for hook in &self.hooks {
            hook(Arc::clone(engine)).await?;
        }
        Ok(())
    }
}

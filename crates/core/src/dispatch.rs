//! The intercept hook: classify, then either hand the request back to the
//! host or answer it with a strategy.

use std::sync::Arc;

use crate::Error;
use crate::cache::{CacheDb, StoreHandle};
use crate::config::{AppConfig, ConfigError};
use crate::lifecycle::StoreLifecycle;
use crate::network::Network;
use crate::request::{RequestDescriptor, Response};
use crate::router::{Classifier, RouteCategory};
use crate::strategy::StrategyExecutor;

/// What the host should do with an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Do not intervene; let default network handling proceed.
    PassThrough(RouteCategory),
    /// Deliver this response instead of doing anything else.
    Respond(Response),
}

/// Routes every intercepted request to its strategy.
///
/// Cheap to clone and safe to call concurrently; it holds no per-request
/// state.
#[derive(Clone)]
pub struct FetchDispatcher {
    classifier: Arc<Classifier>,
    executor: StrategyExecutor,
    store: StoreHandle,
}

impl FetchDispatcher {
    pub fn new(classifier: Classifier, executor: StrategyExecutor, store: StoreHandle) -> Self {
        Self { classifier: Arc::new(classifier), executor, store }
    }

    /// Wire a dispatcher targeting the current store of `lifecycle`.
    pub fn from_config(
        config: &AppConfig, lifecycle: &StoreLifecycle, network: Arc<dyn Network>,
    ) -> Result<Self, ConfigError> {
        let classifier = Classifier::new(config.route_config()?);
        let executor = StrategyExecutor::new(network, config.navigation_fallback()?);
        Ok(Self::new(classifier, executor, lifecycle.current_store()))
    }

    /// Convenience for hosts that only have a database and a config.
    pub fn for_db(config: &AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, ConfigError> {
        let lifecycle = StoreLifecycle::new(db, config.cache_version(), config.store_prefix.clone());
        Self::from_config(config, &lifecycle, network)
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Handle one intercepted request.
    ///
    /// Excluded and unmatched requests come back as `PassThrough` without
    /// touching the store or the network.
    pub async fn handle(&self, req: &RequestDescriptor) -> Result<Dispatch, Error> {
        let category = self.classifier.classify(req);
        let Some(strategy) = category.strategy() else {
            tracing::trace!(url = %req.url(), method = req.method(), %category, "pass-through");
            return Ok(Dispatch::PassThrough(category));
        };

        tracing::debug!(url = %req.url(), %category, ?strategy, "intercepted");
        let response = self.executor.execute(strategy, req, &self.store).await?;
        Ok(Dispatch::Respond(response))
    }
}

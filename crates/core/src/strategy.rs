//! Caching strategies.
//!
//! Each strategy is an independent algorithm over one request, the live
//! network and the current store. None of them keep state between calls;
//! the only lasting effect is new entries written to the store.

use std::sync::Arc;

use url::Url;

use crate::Error;
use crate::cache::{MatchOptions, StoreHandle};
use crate::canonical::with_path;
use crate::network::{FetchOptions, Network};
use crate::request::{RequestDescriptor, Response};

/// Body of the last-resort navigation response.
const OFFLINE_BODY: &str = "Offline";

/// The caching strategies a route category can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Live probe with caching disabled; answers 204 or 503 with no body.
    NoCachePing,
    /// Fresh copy when online, last stored copy when not.
    NetworkThenCache,
    /// Store first; network only on a miss.
    CacheFirst,
    /// Network first; ordered store lookups when offline.
    NetworkFirstNavigation,
}

/// One step of the offline navigation lookup chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackLookup {
    /// The request itself, ignoring its query string.
    RequestIgnoringQuery,
    /// The request path verbatim.
    Path,
    /// The request path with `/` appended.
    PathWithTrailingSlash,
    /// The request path with a document suffix such as `.html` appended.
    PathWithSuffix(String),
}

impl FallbackLookup {
    async fn lookup(&self, req: &RequestDescriptor, store: &StoreHandle) -> Result<Option<Response>, Error> {
        let path = req.url().path();
        match self {
            FallbackLookup::RequestIgnoringQuery => store.match_request(req, MatchOptions::IGNORE_QUERY).await,
            FallbackLookup::Path => store.match_url(&with_path(req.url(), path)).await,
            FallbackLookup::PathWithTrailingSlash => store.match_url(&with_path(req.url(), &format!("{path}/"))).await,
            FallbackLookup::PathWithSuffix(suffix) => {
                store.match_url(&with_path(req.url(), &format!("{path}{suffix}"))).await
            }
        }
    }
}

/// Offline navigation policy: lookups tried in order, then a generic
/// offline document, then a fixed 503.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationFallback {
    pub chain: Vec<FallbackLookup>,
    /// Absolute URL of the generic offline document on the application
    /// origin, whatever origin the failed navigation targeted.
    pub offline_document: Url,
}

impl NavigationFallback {
    /// The standard chain: request, path, path + `/`, path + `suffix`.
    pub fn standard(suffix: &str, offline_document: Url) -> Self {
        Self {
            chain: vec![
                FallbackLookup::RequestIgnoringQuery,
                FallbackLookup::Path,
                FallbackLookup::PathWithTrailingSlash,
                FallbackLookup::PathWithSuffix(suffix.to_string()),
            ],
            offline_document,
        }
    }

    /// Evaluate the chain and return the first hit.
    ///
    /// Store errors are logged and count as misses so the caller always
    /// gets a response.
    pub async fn resolve(&self, req: &RequestDescriptor, store: &StoreHandle) -> Response {
        for step in &self.chain {
            match step.lookup(req, store).await {
                Ok(Some(hit)) => {
                    tracing::debug!(url = %req.url(), ?step, "navigation served from store");
                    return hit;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(url = %req.url(), ?step, error = %e, "store lookup failed"),
            }
        }

        match store.match_url(&self.offline_document).await {
            Ok(Some(doc)) => {
                tracing::debug!(url = %req.url(), "navigation served offline document");
                return doc;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %self.offline_document, error = %e, "offline document lookup failed"),
        }

        tracing::info!(url = %req.url(), "navigation fallback exhausted");
        Response::text(503, OFFLINE_BODY)
    }
}

/// Runs strategies against the live network and a store.
#[derive(Clone)]
pub struct StrategyExecutor {
    network: Arc<dyn Network>,
    fallback: NavigationFallback,
}

impl StrategyExecutor {
    pub fn new(network: Arc<dyn Network>, fallback: NavigationFallback) -> Self {
        Self { network, fallback }
    }

    /// Produce a response for `req` using `strategy`.
    ///
    /// Only `NetworkThenCache` returns `Err`, when neither the network nor
    /// the store can answer.
    pub async fn execute(
        &self, strategy: Strategy, req: &RequestDescriptor, store: &StoreHandle,
    ) -> Result<Response, Error> {
        match strategy {
            Strategy::NoCachePing => Ok(self.no_cache_ping(req).await),
            Strategy::NetworkThenCache => self.network_then_cache(req, store).await,
            Strategy::CacheFirst => Ok(self.cache_first(req, store).await),
            Strategy::NetworkFirstNavigation => Ok(self.network_first_navigation(req, store).await),
        }
    }

    async fn no_cache_ping(&self, req: &RequestDescriptor) -> Response {
        match self.network.fetch(req, FetchOptions::NO_STORE).await {
            Ok(_) => Response::empty(204),
            Err(e) => {
                tracing::debug!(url = %req.url(), error = %e, "ping failed");
                Response::empty(503)
            }
        }
    }

    async fn network_then_cache(&self, req: &RequestDescriptor, store: &StoreHandle) -> Result<Response, Error> {
        match self.network.fetch(req, FetchOptions::NO_STORE).await {
            Ok(fresh) => {
                store_copy(store, req, &fresh).await;
                Ok(fresh)
            }
            Err(e) => match lookup(store, req).await {
                Some(cached) => {
                    tracing::info!(url = %req.url(), error = %e, "network failed, serving stored copy");
                    Ok(cached)
                }
                None => Err(e),
            },
        }
    }

    async fn cache_first(&self, req: &RequestDescriptor, store: &StoreHandle) -> Response {
        if let Some(cached) = lookup(store, req).await {
            tracing::debug!(url = %req.url(), "cache hit");
            return cached;
        }

        match self.network.fetch(req, FetchOptions::default()).await {
            Ok(fresh) => {
                store_copy(store, req, &fresh).await;
                fresh
            }
            Err(e) => {
                tracing::info!(url = %req.url(), error = %e, "cache miss and network failed");
                Response::empty(503)
            }
        }
    }

    async fn network_first_navigation(&self, req: &RequestDescriptor, store: &StoreHandle) -> Response {
        match self.network.fetch(req, FetchOptions::NO_STORE).await {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::debug!(url = %req.url(), error = %e, "navigation offline, walking fallback chain");
                self.fallback.resolve(req, store).await
            }
        }
    }
}

/// Query-insensitive lookup that treats store errors as misses.
async fn lookup(store: &StoreHandle, req: &RequestDescriptor) -> Option<Response> {
    match store.match_request(req, MatchOptions::IGNORE_QUERY).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(url = %req.url(), error = %e, "store lookup failed");
            None
        }
    }
}

/// Store a copy of a 2xx response and wait for the write.
///
/// The write runs on its own task, so it completes even if the caller
/// abandons the request.
async fn store_copy(store: &StoreHandle, req: &RequestDescriptor, response: &Response) {
    if !response.is_success() {
        tracing::debug!(url = %req.url(), status = response.status, "not storing non-success response");
        return;
    }

    let store = store.clone();
    let req = req.clone();
    let response = response.clone();
    let url = req.url().to_string();
    let write = tokio::spawn(async move { store.put(&req, &response).await });

    match write.await {
        Ok(Ok(())) => tracing::debug!(url = %url, "stored response"),
        Ok(Err(e)) => tracing::warn!(url = %url, error = %e, "failed to store response"),
        Err(e) => tracing::warn!(url = %url, error = %e, "store task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheDb;
    use crate::testing::ScriptedNetwork;

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::get(Url::parse(url).unwrap())
    }

    fn fallback() -> NavigationFallback {
        NavigationFallback::standard(".html", Url::parse("https://app.test/offline").unwrap())
    }

    async fn setup(network: ScriptedNetwork) -> (Arc<ScriptedNetwork>, StrategyExecutor, StoreHandle) {
        let network = Arc::new(network);
        let executor = StrategyExecutor::new(network.clone(), fallback());
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("cache-v1").await.unwrap();
        (network, executor, store)
    }

    #[tokio::test]
    async fn test_ping_online_returns_204_and_stores_nothing() {
        let network = ScriptedNetwork::new().respond("https://app.test/ping", Response::text(200, "pong"));
        let (network, executor, store) = setup(network).await;
        let req = get("https://app.test/ping");

        let res = executor.execute(Strategy::NoCachePing, &req, &store).await.unwrap();
        assert_eq!(res.status, 204);
        assert!(res.body.is_empty());
        assert!(network.calls()[0].1.no_store);
        assert!(store.match_request(&req, MatchOptions::IGNORE_QUERY).await.unwrap().is_none());
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping_offline_returns_503() {
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        let res = executor
            .execute(Strategy::NoCachePing, &get("https://app.test/ping"), &store)
            .await
            .unwrap();
        assert_eq!(res.status, 503);
        assert!(res.body.is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_second_request_skips_network() {
        let network =
            ScriptedNetwork::new().respond("https://app.test/static/app.css", Response::text(200, "body{}"));
        let (network, executor, store) = setup(network).await;

        let first = executor
            .execute(Strategy::CacheFirst, &get("https://app.test/static/app.css"), &store)
            .await
            .unwrap();
        assert_eq!(&first.body[..], b"body{}");
        assert_eq!(network.call_count(), 1);
        assert!(!network.calls()[0].1.no_store);

        network.set_offline(true);
        let second = executor
            .execute(Strategy::CacheFirst, &get("https://app.test/static/app.css?v=2"), &store)
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(network.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_errors() {
        let network = ScriptedNetwork::new().respond("https://app.test/static/gone.png", Response::empty(404));
        let (network, executor, store) = setup(network).await;
        let req = get("https://app.test/static/gone.png");

        let res = executor.execute(Strategy::CacheFirst, &req, &store).await.unwrap();
        assert_eq!(res.status, 404);
        assert!(store.keys().await.unwrap().is_empty());

        executor.execute(Strategy::CacheFirst, &req, &store).await.unwrap();
        assert_eq!(network.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_returns_503() {
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        let res = executor
            .execute(Strategy::CacheFirst, &get("https://app.test/scan"), &store)
            .await
            .unwrap();
        assert_eq!(res.status, 503);
    }

    #[tokio::test]
    async fn test_network_then_cache_stores_fresh_copy() {
        let url = "https://app.test/api/offline/latest.zip";
        let network = ScriptedNetwork::new().respond(url, Response::text(200, "zip-v2"));
        let (network, executor, store) = setup(network).await;
        store.put(&get(url), &Response::text(200, "zip-v1")).await.unwrap();

        let res = executor.execute(Strategy::NetworkThenCache, &get(url), &store).await.unwrap();
        assert_eq!(&res.body[..], b"zip-v2");
        assert!(network.calls()[0].1.no_store);

        let stored = store.match_url(&Url::parse(url).unwrap()).await.unwrap().unwrap();
        assert_eq!(&stored.body[..], b"zip-v2");
    }

    #[tokio::test]
    async fn test_network_then_cache_offline_returns_prior_entry() {
        let url = "https://app.test/api/offline/latest.zip";
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        let prior = Response::text(200, "zip-v1");
        store.put(&get(url), &prior).await.unwrap();

        let res = executor
            .execute(Strategy::NetworkThenCache, &get(&format!("{url}?t=123")), &store)
            .await
            .unwrap();
        assert_eq!(res, prior);
    }

    #[tokio::test]
    async fn test_network_then_cache_offline_without_entry_fails() {
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        let result = executor
            .execute(Strategy::NetworkThenCache, &get("https://app.test/api/offline/latest.zip"), &store)
            .await;
        assert!(matches!(result, Err(Error::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_navigation_online_bypasses_store() {
        let network = ScriptedNetwork::new().respond("https://app.test/home", Response::text(200, "fresh"));
        let (network, executor, store) = setup(network).await;
        let req = get("https://app.test/home").with_navigation(true);
        store.put(&req, &Response::text(200, "stale")).await.unwrap();

        let res = executor.execute(Strategy::NetworkFirstNavigation, &req, &store).await.unwrap();
        assert_eq!(&res.body[..], b"fresh");
        assert!(network.calls()[0].1.no_store);

        let stored = store.match_url(req.url()).await.unwrap().unwrap();
        assert_eq!(&stored.body[..], b"stale");
    }

    #[tokio::test]
    async fn test_navigation_offline_uses_html_suffix() {
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        store
            .put(&get("https://app.test/foo.html"), &Response::text(200, "foo page"))
            .await
            .unwrap();

        let req = get("https://app.test/foo").with_navigation(true);
        let res = executor.execute(Strategy::NetworkFirstNavigation, &req, &store).await.unwrap();
        assert_eq!(&res.body[..], b"foo page");
    }

    #[tokio::test]
    async fn test_navigation_offline_chain_order() {
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        store.put(&get("https://app.test/docs/"), &Response::text(200, "slash")).await.unwrap();
        store.put(&get("https://app.test/docs.html"), &Response::text(200, "html")).await.unwrap();

        let req = get("https://app.test/docs?page=2").with_navigation(true);
        let res = executor.execute(Strategy::NetworkFirstNavigation, &req, &store).await.unwrap();
        assert_eq!(&res.body[..], b"slash");

        store.put(&get("https://app.test/docs"), &Response::text(200, "exact")).await.unwrap();
        let res = executor.execute(Strategy::NetworkFirstNavigation, &req, &store).await.unwrap();
        assert_eq!(&res.body[..], b"exact");
    }

    #[tokio::test]
    async fn test_navigation_offline_document_then_503() {
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        let req = get("https://app.test/unknown").with_navigation(true);

        let res = executor.execute(Strategy::NetworkFirstNavigation, &req, &store).await.unwrap();
        assert_eq!(res.status, 503);
        assert_eq!(&res.body[..], b"Offline");

        store.put(&get("https://app.test/offline"), &Response::text(200, "you are offline")).await.unwrap();
        let res = executor.execute(Strategy::NetworkFirstNavigation, &req, &store).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(&res.body[..], b"you are offline");
    }

    #[tokio::test]
    async fn test_cross_origin_navigation_uses_app_offline_document() {
        let (_, executor, store) = setup(ScriptedNetwork::new()).await;
        store.put(&get("https://app.test/offline"), &Response::text(200, "you are offline")).await.unwrap();

        let req = get("https://partner.example/portal").with_navigation(true);
        let res = executor.execute(Strategy::NetworkFirstNavigation, &req, &store).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(&res.body[..], b"you are offline");
    }

    #[test]
    fn test_standard_chain_order() {
        assert_eq!(
            fallback().chain,
            vec![
                FallbackLookup::RequestIgnoringQuery,
                FallbackLookup::Path,
                FallbackLookup::PathWithTrailingSlash,
                FallbackLookup::PathWithSuffix(".html".into()),
            ]
        );
    }
}

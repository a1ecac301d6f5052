//! In-process network double for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::Error;
use crate::network::{FetchOptions, Network};
use crate::request::{RequestDescriptor, Response};

/// Answers fetches from a URL table and records every call.
///
/// Unknown URLs, and every URL while offline, fail with `NetworkUnavailable`.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<(String, FetchOptions)>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: Response) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), response);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, FetchOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &RequestDescriptor, options: FetchOptions) -> Result<Response, Error> {
        let url = request.url().to_string();
        self.calls.lock().unwrap().push((url.clone(), options));

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkUnavailable(format!("offline: {url}")));
        }

        self.routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| Error::NetworkUnavailable(format!("unreachable: {url}")))
    }
}

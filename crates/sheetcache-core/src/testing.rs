//! Scripted network double for strategy and lifecycle tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::NetworkError;
use crate::http::{Request, Response};
use crate::lifecycle::{LifecycleContext, Manifest};
use crate::net::{FetchOptions, Network};
use crate::store::MemoryStorage;
use crate::version::Version;

pub const SCOPE: &str = "https://lookup.example.test/pkgo/";
pub const FEED: &str = "https://docs.example.test/spreadsheets/d/abc/export?format=csv";

#[derive(Clone)]
struct Route {
    response: Response,
    delay: Duration,
}

#[derive(Default)]
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: Mutex<Vec<(String, FetchOptions)>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.respond_after(url, response, Duration::ZERO);
    }

    pub fn respond_after(&self, url: &str, response: Response, delay: Duration) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route { response, delay });
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn options_for(&self, url: &str) -> Vec<FetchOptions> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, o)| *o)
            .collect()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(
        &self,
        request: &Request,
        options: FetchOptions,
    ) -> Result<Response, NetworkError> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push((url.clone(), options));

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable(url));
        }
        let route = self.routes.lock().unwrap().get(&url).cloned();
        let Some(route) = route else {
            return Err(NetworkError::Unreachable(format!("no route for {}", url)));
        };
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        let mut response = route.response;
        response.url = Some(url);
        Ok(response)
    }
}

pub fn scope() -> Url {
    Url::parse(SCOPE).unwrap()
}

pub fn asset(path: &str) -> Url {
    scope().join(path).unwrap()
}

pub fn manifest() -> Manifest {
    Manifest {
        shell_page: "./index.html".to_string(),
        offline_page: "./offline.html".to_string(),
        assets: vec!["./styles.css".to_string(), "./main.js".to_string()],
    }
}

pub fn context(tag: &str, storage: Arc<MemoryStorage>) -> Arc<LifecycleContext> {
    Arc::new(
        LifecycleContext::new(Version::parse(tag).unwrap(), scope(), manifest(), storage).unwrap(),
    )
}

/// Route every manifest asset to a 200 response
pub fn serve_manifest(network: &MockNetwork) {
    network.respond(asset("./index.html").as_str(), Response::new(200, "text/html", "<html>shell"));
    network.respond(asset("./offline.html").as_str(), Response::new(200, "text/html", "<html>offline"));
    network.respond(asset("./styles.css").as_str(), Response::new(200, "text/css", "body{}"));
    network.respond(asset("./main.js").as_str(), Response::new(200, "text/javascript", "boot()"));
}

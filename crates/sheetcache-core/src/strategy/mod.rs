//! One caching strategy per resource class.
//!
//! | Class            | Strategy                                   |
//! |------------------|--------------------------------------------|
//! | Navigation       | network-first, timeout, offline page       |
//! | SameOriginStatic | stale-while-revalidate                     |
//! | RemoteDynamic    | network-first, content-type guarded, 503   |
//!
//! Store read failures are logged and treated as misses; store write
//! failures are logged and the response is still returned.

pub mod dynamic;
pub mod navigation;
pub mod static_assets;

pub use dynamic::network_first_guarded;
pub use navigation::network_first_with_fallback;
pub use static_assets::stale_while_revalidate;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Method;
use tokio::task::JoinSet;
use tracing::warn;

use crate::http::{CacheKey, Request, Response};
use crate::lifecycle::LifecycleContext;
use crate::store::CachedEntry;
use crate::version::StoreName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Network,
    Cache,
    OfflineFallback,
    /// Fabricated by the layer, e.g. the 503 for an unreachable feed
    Synthetic,
    /// Not intercepted at all
    Passthrough,
}

impl Source {
    pub fn label(&self) -> &'static str {
        match self {
            Source::Network => "network",
            Source::Cache => "cache",
            Source::OfflineFallback => "offline-fallback",
            Source::Synthetic => "synthetic",
            Source::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

impl Served {
    pub fn new(response: Response, source: Source) -> Self {
        Self { response, source }
    }
}

/// Work that outlives the request that started it: background revalidation
/// and navigation fetches whose wait timed out.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every background task, including ones spawned while waiting
    pub async fn settle(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.lock());
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Background task failed");
                }
            }
        }
    }
}

/// Only complete GET responses go into a store; a HEAD has no body to serve later
fn cacheable(request: &Request, response: &Response) -> bool {
    request.method == Method::GET && response.is_success()
}

/// A HEAD answered from a store gets the stored status and headers only
fn from_store(request: &Request, mut response: Response) -> Response {
    if request.method == Method::HEAD {
        response.body.clear();
    }
    response
}

fn read_entry(ctx: &LifecycleContext, store: &StoreName, key: &CacheKey) -> Option<CachedEntry> {
    match ctx.storage().get(store, key) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(store = %store, key = %key, error = %e, "Failed to read cache entry");
            None
        }
    }
}

fn write_entry(ctx: &LifecycleContext, store: &StoreName, key: &CacheKey, response: &Response) {
    if let Err(e) = ctx.storage().put(store, key, response) {
        warn!(store = %store, key = %key, error = %e, "Failed to write cache entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_head_from_store_has_no_body() {
        let url = reqwest::Url::parse("https://lookup.example.test/pkgo/styles.css").unwrap();
        let stored = Response::new(200, "text/css", "body{}");

        let head = from_store(&Request::get(url.clone()).with_method(Method::HEAD), stored.clone());
        assert!(head.body.is_empty());
        assert_eq!(head.content_type().as_deref(), Some("text/css"));

        let get = from_store(&Request::get(url), stored.clone());
        assert_eq!(get, stored);
    }

    #[tokio::test]
    async fn test_settle_waits_for_nested_spawns() {
        let background = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_bg = background.clone();
        let inner_done = Arc::clone(&done);
        background.spawn(async move {
            let nested_done = Arc::clone(&inner_done);
            inner_bg.spawn(async move {
                tokio::task::yield_now().await;
                nested_done.fetch_add(1, Ordering::SeqCst);
            });
            inner_done.fetch_add(1, Ordering::SeqCst);
        });

        background.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert_eq!(background.pending(), 0);
    }
}

//! Network-first for third-party data feeds.
//!
//! A response is stored only if it is a 2xx whose content type is an
//! accepted data type and whose body does not sniff as HTML. An upstream
//! outage page must never become the last-known-good copy. When the network
//! is down and no valid copy exists the caller gets a synthetic 503, never
//! the page shell.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::guard::{looks_like_markup, ContentTypeGuard};
use crate::http::{Request, Response};
use crate::lifecycle::LifecycleContext;
use crate::net::{FetchOptions, Network};
use crate::strategy::{cacheable, from_store, read_entry, write_entry, Served, Source};

fn is_valid_data(response: &Response, guard: &ContentTypeGuard) -> bool {
    guard.accepts(response.content_type().as_deref()) && !looks_like_markup(&response.body)
}

pub async fn network_first_guarded(
    ctx: &Arc<LifecycleContext>,
    network: &Arc<dyn Network>,
    request: &Request,
    guard: &ContentTypeGuard,
) -> Served {
    let store = ctx.dynamic_store();
    let key = request.key();

    match network.fetch(request, FetchOptions::no_cache()).await {
        Ok(response) => {
            if cacheable(request, &response) && is_valid_data(&response, guard) {
                write_entry(ctx, &store, &key, &response);
            } else {
                debug!(
                    url = %request.url,
                    status = response.status,
                    content_type = %response.content_type().unwrap_or_default(),
                    "Data response not stored"
                );
            }
            Served::new(response, Source::Network)
        }
        Err(e) => {
            warn!(url = %request.url, error = %e, "Data feed fetch failed");
            match read_entry(ctx, &store, &key) {
                Some(entry) if is_valid_data(&entry.response, guard) => {
                    Served::new(from_store(request, entry.response), Source::Cache)
                }
                _ => Served::new(Response::unavailable(), Source::Synthetic),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::CacheKey;
    use crate::store::{CacheStorage, MemoryStorage};
    use crate::testing::{self, MockNetwork, FEED};

    struct Fixture {
        storage: Arc<MemoryStorage>,
        ctx: Arc<LifecycleContext>,
        network: Arc<MockNetwork>,
        guard: ContentTypeGuard,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = Arc::new(MemoryStorage::new());
            Self {
                ctx: testing::context("v1", Arc::clone(&storage)),
                storage,
                network: MockNetwork::new(),
                guard: ContentTypeGuard::new(["text/csv", "application/json"]),
            }
        }

        fn stored(&self) -> Option<Response> {
            self.storage
                .get(&self.ctx.dynamic_store(), &CacheKey::from_raw(FEED))
                .unwrap()
                .map(|e| e.response)
        }

        async fn fetch(&self) -> Served {
            let network: Arc<dyn Network> = self.network.clone();
            let request = Request::get(FEED.parse().unwrap());
            network_first_guarded(&self.ctx, &network, &request, &self.guard).await
        }
    }

    #[tokio::test]
    async fn test_csv_is_cached_and_served_offline_unchanged() {
        let fx = Fixture::new();
        let csv = "name,number\nPikachu,25\n";
        fx.network.respond(FEED, Response::new(200, "text/csv; charset=utf-8", csv));

        let first = fx.fetch().await;
        assert_eq!(first.source, Source::Network);
        assert!(fx.stored().is_some());

        fx.network.set_offline(true);
        let second = fx.fetch().await;
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.response.body, csv.as_bytes());
    }

    #[tokio::test]
    async fn test_html_error_page_is_returned_but_never_stored() {
        let fx = Fixture::new();
        fx.network.respond(FEED, Response::new(200, "text/html", "<!DOCTYPE html><p>Sign in"));

        let served = fx.fetch().await;
        assert_eq!(served.response.content_type().as_deref(), Some("text/html"));
        assert!(fx.stored().is_none());
    }

    #[tokio::test]
    async fn test_html_does_not_overwrite_last_known_good() {
        let fx = Fixture::new();
        fx.network.respond(FEED, Response::new(200, "text/csv", "a,b\n1,2\n"));
        fx.fetch().await;
        let before = fx.stored().unwrap();

        fx.network.respond(FEED, Response::new(503, "text/html", "<html>outage"));
        fx.fetch().await;
        assert_eq!(fx.stored().unwrap(), before);
    }

    #[tokio::test]
    async fn test_mislabelled_markup_is_not_stored() {
        let fx = Fixture::new();
        fx.network.respond(FEED, Response::new(200, "text/csv", "<html><body>quota exceeded"));

        fx.fetch().await;
        assert!(fx.stored().is_none());
    }

    #[tokio::test]
    async fn test_offline_with_nothing_cached_is_503() {
        let fx = Fixture::new();
        fx.network.set_offline(true);

        let served = fx.fetch().await;
        assert_eq!(served.source, Source::Synthetic);
        assert_eq!(served.response.status, 503);
        assert!(served.response.is_synthetic());
    }

    #[tokio::test]
    async fn test_offline_never_substitutes_shell() {
        let fx = Fixture::new();
        fx.storage
            .put(&fx.ctx.static_store(), &fx.ctx.shell_key(), &Response::new(200, "text/html", "<html>shell"))
            .unwrap();
        fx.network.set_offline(true);

        let served = fx.fetch().await;
        assert_eq!(served.response.status, 503);
        assert!(!looks_like_markup(&served.response.body));
    }

    #[tokio::test]
    async fn test_stale_invalid_entry_is_not_served() {
        let fx = Fixture::new();
        // Left behind by an older, unguarded generation
        fx.storage
            .put(&fx.ctx.dynamic_store(), &CacheKey::from_raw(FEED), &Response::new(200, "text/html", "<html>old"))
            .unwrap();
        fx.network.set_offline(true);

        let served = fx.fetch().await;
        assert_eq!(served.source, Source::Synthetic);
    }

    #[tokio::test]
    async fn test_bypasses_http_cache() {
        let fx = Fixture::new();
        fx.network.respond(FEED, Response::new(200, "text/csv", "a\n"));

        fx.fetch().await;
        assert_eq!(fx.network.options_for(FEED), vec![FetchOptions::no_cache()]);
    }
}

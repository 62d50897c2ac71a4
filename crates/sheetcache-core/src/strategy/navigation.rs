//! Network-first for page navigations, bounded by a timeout.
//!
//! The network fetch runs as a background task. When the timeout fires we
//! stop waiting and serve the offline page, but the fetch keeps going and
//! still refreshes the shell snapshot when it lands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::http::Request;
use crate::lifecycle::LifecycleContext;
use crate::net::{FetchOptions, Network};
use crate::strategy::{
    cacheable, from_store, read_entry, write_entry, BackgroundTasks, Served, Source,
};

pub async fn network_first_with_fallback(
    ctx: &Arc<LifecycleContext>,
    network: &Arc<dyn Network>,
    background: &BackgroundTasks,
    request: &Request,
    timeout: Duration,
) -> Result<Served, FetchError> {
    let (tx, rx) = oneshot::channel();
    {
        let ctx = Arc::clone(ctx);
        let network = Arc::clone(network);
        let request = request.clone();
        background.spawn(async move {
            let result = network.fetch(&request, FetchOptions::default()).await;
            if let Ok(ref response) = result {
                if cacheable(&request, response) && ctx.in_scope(&request.url) {
                    write_entry(&ctx, &ctx.static_store(), &ctx.shell_key(), response);
                    debug!(url = %request.url, "Refreshed shell snapshot");
                }
            }
            // The receiver is gone if the wait already timed out
            let _ = tx.send(result);
        });
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(response))) => return Ok(Served::new(response, Source::Network)),
        Ok(Ok(Err(e))) => warn!(url = %request.url, error = %e, "Navigation fetch failed"),
        Ok(Err(_)) => warn!(url = %request.url, "Navigation fetch ended without a result"),
        Err(_) => warn!(
            url = %request.url,
            timeout_ms = timeout.as_millis() as u64,
            "Navigation fetch timed out"
        ),
    }

    match read_entry(ctx, &ctx.static_store(), &ctx.offline_key()) {
        Some(entry) => Ok(Served::new(
            from_store(request, entry.response),
            Source::OfflineFallback,
        )),
        None => Err(FetchError::OfflineFallbackMissing {
            url: request.url.to_string(),
        }),
    }
}

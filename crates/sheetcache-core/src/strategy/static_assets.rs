//! Stale-while-revalidate for the application's own assets.

use std::sync::Arc;

use tracing::debug;

use crate::error::FetchError;
use crate::http::Request;
use crate::lifecycle::LifecycleContext;
use crate::net::{FetchOptions, Network};
use crate::strategy::{
    cacheable, from_store, read_entry, write_entry, BackgroundTasks, Served, Source,
};

/// Serve the cached copy immediately and refresh it in the background. On a
/// miss, fetch, store on success, and propagate transport errors to the
/// caller.
pub async fn stale_while_revalidate(
    ctx: &Arc<LifecycleContext>,
    network: &Arc<dyn Network>,
    background: &BackgroundTasks,
    request: &Request,
) -> Result<Served, FetchError> {
    let store = ctx.static_store();
    let key = request.key();

    if let Some(entry) = read_entry(ctx, &store, &key) {
        let revalidate = {
            let ctx = Arc::clone(ctx);
            let network = Arc::clone(network);
            let request = request.clone();
            async move {
                match network.fetch(&request, FetchOptions::default()).await {
                    Ok(response) if cacheable(&request, &response) => {
                        write_entry(&ctx, &ctx.static_store(), &request.key(), &response);
                    }
                    Ok(response) => {
                        debug!(url = %request.url, status = response.status, "Revalidation returned an error status");
                    }
                    Err(e) => {
                        debug!(url = %request.url, error = %e, "Revalidation failed");
                    }
                }
            }
        };
        background.spawn(revalidate);
        return Ok(Served::new(from_store(request, entry.response), Source::Cache));
    }

    let response = network.fetch(request, FetchOptions::default()).await?;
    if cacheable(request, &response) {
        write_entry(ctx, &store, &key, &response);
    }
    Ok(Served::new(response, Source::Network))
}

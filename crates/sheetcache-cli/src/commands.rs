//! Subcommand implementations.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use sheetcache_core::{
    CacheStorage, Config, DiskStorage, HttpNetwork, InterceptionLayer, LayerOptions,
    LifecycleContext, Network, Request, StoreName,
};
use tracing::warn;

/// Build the layer for the configured version on top of the on-disk store
fn build_layer(config: &Config) -> Result<InterceptionLayer> {
    let cache_dir = config.cache_dir()?;
    let storage = Arc::new(
        DiskStorage::new(cache_dir.clone())
            .with_context(|| format!("Failed to open cache directory: {}", cache_dir.display()))?,
    );
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(config.request_timeout())?);
    let ctx = LifecycleContext::new(
        config.version()?,
        config.scope_url()?,
        config.manifest(),
        storage,
    )?;
    Ok(InterceptionLayer::new(
        Arc::new(ctx),
        network,
        LayerOptions::from_config(config),
    ))
}

/// Activate a version installed by an earlier run
async fn resume_and_activate(config: &Config, layer: &InterceptionLayer) -> Result<Vec<String>> {
    if !layer.resume()? {
        anyhow::bail!(
            "Version {} is not installed; run `sheetcache install` first",
            config.version
        );
    }
    Ok(layer.activate().await?.deleted)
}

fn print_deleted(deleted: &[String]) {
    if deleted.is_empty() {
        eprintln!("No stale stores");
    }
    for name in deleted {
        eprintln!("Deleted {}", name);
    }
}

pub async fn install(config: &Config, activate: bool) -> Result<()> {
    let layer = build_layer(config)?;
    let report = layer
        .install()
        .await
        .with_context(|| format!("Install of {} failed", config.version))?;
    eprintln!(
        "Installed {} ({} core assets, {})",
        report.store,
        report.assets,
        if report.created { "new store" } else { "refreshed" }
    );

    if activate {
        print_deleted(&layer.activate().await?.deleted);
        eprintln!("Activated {}", config.version);
    }
    Ok(())
}

pub async fn activate(config: &Config) -> Result<()> {
    let layer = build_layer(config)?;
    print_deleted(&resume_and_activate(config, &layer).await?);
    eprintln!("Activated {}", config.version);
    Ok(())
}

pub async fn fetch(config: &Config, urls: &[String], navigate: bool) -> Result<()> {
    let layer = build_layer(config)?;
    resume_and_activate(config, &layer).await?;

    let scope = config.scope_url()?;
    let requests = urls
        .iter()
        .map(|raw| {
            let url = scope
                .join(raw)
                .with_context(|| format!("Invalid URL: {}", raw))?;
            Ok(if navigate {
                Request::navigate(url)
            } else {
                Request::get(url)
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let results =
        futures::future::join_all(requests.iter().map(|request| layer.handle_fetch(request)))
            .await;

    let mut failures = 0;
    let single = results.len() == 1;
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(served) => {
                eprintln!(
                    "{} {:<16} {}",
                    served.response.status,
                    served.source.label(),
                    request.url
                );
                if single {
                    std::io::stdout()
                        .write_all(&served.response.body)
                        .context("Failed to write response body")?;
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("ERR {:<16} {}: {}", "-", request.url, e);
            }
        }
    }

    // Let background revalidation finish before the process exits
    layer.settle().await;

    if failures > 0 {
        anyhow::bail!("{} of {} requests failed", failures, requests.len());
    }
    Ok(())
}

pub fn stores(config: &Config) -> Result<()> {
    let version = config.version()?;
    let storage = DiskStorage::new(config.cache_dir()?)?;

    let names = storage.store_names()?;
    if names.is_empty() {
        println!("No stores in {}", storage.stores_dir().display());
        return Ok(());
    }

    for raw in names {
        let Ok(name) = raw.parse::<StoreName>() else {
            println!("{:<32} foreign", raw);
            continue;
        };
        let status = if name.belongs_to(&version) { "current" } else { "stale" };
        let keys = storage.keys(&name)?;
        let newest = keys
            .iter()
            .filter_map(|key| match storage.get(&name, key) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(store = %name, key = %key, error = %e, "Failed to read entry");
                    None
                }
            })
            .max_by_key(|entry| entry.cached_at);
        println!(
            "{:<32} {:<8} {:>5} entries  newest {}",
            raw,
            status,
            keys.len(),
            newest
                .map(|e| e.age_display())
                .unwrap_or_else(|| "never".to_string())
        );
    }
    Ok(())
}

//! Version and store lifecycle.
//!
//! `LifecycleContext` is the single owner of "which version is live": the
//! deploy version, the scope, the resolved core-asset manifest, the storage
//! handle and the controlling flag. Strategies get it by reference instead
//! of reading globals.
//!
//! `LifecycleManager` runs the two lifecycle events:
//! - install: fetch every core asset, then populate the `Static` store
//! - activate: purge every store not tagged with the current version, take
//!   control, and notify open page sessions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{InstallError, NetworkError, StoreError};
use crate::http::{CacheKey, Request, RequestMode, Response};
use crate::message::Message;
use crate::net::{FetchOptions, Network};
use crate::store::CacheStorage;
use crate::version::{Purpose, StoreName, Version};

/// Buffer size for the page-session broadcast channel.
/// Sessions only ever need the latest activation notice.
const SESSION_CHANNEL_CAPACITY: usize = 16;

/// Deploy-fixed list of assets that must all be cacheable for an install.
/// Paths are relative to the scope URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub shell_page: String,
    pub offline_page: String,
    pub assets: Vec<String>,
}

impl Manifest {
    fn resolve_one(scope: &Url, path: &str) -> Result<Url, InstallError> {
        scope.join(path).map_err(|e| InstallError::InvalidAsset {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

pub struct LifecycleContext {
    version: Version,
    scope: Url,
    shell_url: Url,
    offline_url: Url,
    core_assets: Vec<Url>,
    storage: Arc<dyn CacheStorage>,
    controlling: AtomicBool,
}

impl LifecycleContext {
    pub fn new(
        version: Version,
        scope: Url,
        manifest: Manifest,
        storage: Arc<dyn CacheStorage>,
    ) -> Result<Self, InstallError> {
        let shell_url = Manifest::resolve_one(&scope, &manifest.shell_page)?;
        let offline_url = Manifest::resolve_one(&scope, &manifest.offline_page)?;

        let mut core_assets = vec![shell_url.clone(), offline_url.clone()];
        for path in &manifest.assets {
            let url = Manifest::resolve_one(&scope, path)?;
            if !core_assets.contains(&url) {
                core_assets.push(url);
            }
        }

        Ok(Self {
            version,
            scope,
            shell_url,
            offline_url,
            core_assets,
            storage,
            controlling: AtomicBool::new(false),
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn storage(&self) -> &dyn CacheStorage {
        self.storage.as_ref()
    }

    pub fn core_assets(&self) -> &[Url] {
        &self.core_assets
    }

    pub fn static_store(&self) -> StoreName {
        StoreName::new(Purpose::Static, self.version.clone())
    }

    pub fn dynamic_store(&self) -> StoreName {
        StoreName::new(Purpose::Dynamic, self.version.clone())
    }

    pub fn shell_key(&self) -> CacheKey {
        CacheKey::from_url(&self.shell_url)
    }

    pub fn offline_key(&self) -> CacheKey {
        CacheKey::from_url(&self.offline_url)
    }

    pub fn in_scope(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.scope.as_str())
    }

    /// True once activation has purged stale stores
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::Acquire)
    }

    fn mark_controlling(&self) {
        self.controlling.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub store: StoreName,
    /// False when an existing store of this version was reused
    pub created: bool,
    pub assets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub sessions_notified: usize,
}

pub struct LifecycleManager {
    ctx: Arc<LifecycleContext>,
    network: Arc<dyn Network>,
    sessions: broadcast::Sender<Message>,
}

impl LifecycleManager {
    pub fn new(ctx: Arc<LifecycleContext>, network: Arc<dyn Network>) -> Self {
        let (sessions, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self {
            ctx,
            network,
            sessions,
        }
    }

    pub fn context(&self) -> &Arc<LifecycleContext> {
        &self.ctx
    }

    /// Attach a page session; it receives every later activation notice
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sessions.subscribe()
    }

    /// Cache every core asset into the current `Static` store.
    ///
    /// All assets are fetched first, one task each, reporting over a
    /// completion channel. The first failure aborts the rest and nothing is
    /// written, so a broken shell never reaches the store.
    pub async fn on_install(&self) -> Result<InstallReport, InstallError> {
        let assets = self.ctx.core_assets().to_vec();
        let expected = assets.len();
        info!(version = %self.ctx.version(), assets = expected, "Installing");

        let (tx, mut rx) = mpsc::channel::<(Url, Result<Response, NetworkError>)>(expected.max(1));
        let mut tasks = JoinSet::new();
        for url in assets {
            let tx = tx.clone();
            let network = Arc::clone(&self.network);
            tasks.spawn(async move {
                let request = Request::get(url.clone()).with_mode(RequestMode::SameOrigin);
                let result = network.fetch(&request, FetchOptions::no_cache()).await;
                let _ = tx.send((url, result)).await;
            });
        }
        drop(tx);

        let mut fetched = Vec::with_capacity(expected);
        while let Some((url, result)) = rx.recv().await {
            match result {
                Ok(response) if response.is_success() => {
                    fetched.push((CacheKey::from_url(&url), response));
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "Core asset returned an error status");
                    tasks.abort_all();
                    return Err(InstallError::asset_unavailable(
                        url.as_str(),
                        format!("HTTP {}", response.status),
                    ));
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Core asset fetch failed");
                    tasks.abort_all();
                    return Err(InstallError::asset_unavailable(url.as_str(), e));
                }
            }
        }
        if fetched.len() != expected {
            return Err(InstallError::asset_unavailable(
                self.ctx.scope().as_str(),
                format!("only {} of {} asset fetches completed", fetched.len(), expected),
            ));
        }

        let store = self.ctx.static_store();
        let storage = self.ctx.storage();
        let created = storage.open(&store)?;
        for (key, response) in &fetched {
            storage.put(&store, key, response)?;
        }

        info!(store = %store, created, "Core assets cached");
        Ok(InstallReport {
            store,
            created,
            assets: fetched.len(),
        })
    }

    /// Delete every store not tagged with the current version (stores whose
    /// name does not parse at all are left over from older deploys and go
    /// too), then take control and tell every open page session.
    ///
    /// Running this against an already-clean store set deletes nothing.
    pub async fn on_activate(&self) -> Result<ActivationReport, StoreError> {
        let version = self.ctx.version();
        let storage = self.ctx.storage();

        let mut deleted = Vec::new();
        for name in storage.store_names()? {
            let current = name
                .parse::<StoreName>()
                .map(|parsed| parsed.belongs_to(version))
                .unwrap_or(false);
            if current {
                continue;
            }
            if storage.delete_store(&name)? {
                info!(store = %name, "Deleted stale store");
                deleted.push(name);
            }
        }

        self.ctx.mark_controlling();

        let sessions_notified = match self.sessions.send(Message::Activated {
            version: version.clone(),
        }) {
            Ok(count) => count,
            Err(_) => {
                debug!("No open page sessions to notify");
                0
            }
        };

        info!(version = %version, deleted = deleted.len(), sessions_notified, "Activated");
        Ok(ActivationReport {
            deleted,
            sessions_notified,
        })
    }
}

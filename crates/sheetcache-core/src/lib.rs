//! sheetcache - offline caching and update coordination for a page that
//! renders spreadsheet-sourced lookup data.
//!
//! The interception layer sits between the page and the network:
//! - `classify` sorts each request into navigation, own-asset or data feed
//! - `strategy` holds one caching strategy per class
//! - `lifecycle` owns the versioned stores and their install/activate cutover
//! - `layer` wires those together behind one handler per event
//! - `coordinator` is the page side: registration, update polling, and the
//!   single reload when a new version takes over

pub mod classify;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod http;
pub mod layer;
pub mod lifecycle;
pub mod message;
pub mod net;
pub mod store;
pub mod strategy;
pub mod version;

#[cfg(test)]
mod testing;

pub use classify::{classify, Interception, ResourceClass};
pub use config::Config;
pub use coordinator::{PageEvent, PageHost, UpdateCoordinator, UpdateState};
pub use error::{
    ActivationError, CoordinatorError, FetchError, InstallError, NetworkError, StoreError,
};
pub use http::{CacheKey, Request, RequestMode, Response};
pub use layer::{InterceptionLayer, LayerOptions, WorkerState};
pub use lifecycle::{ActivationReport, InstallReport, LifecycleContext, LifecycleManager, Manifest};
pub use message::Message;
pub use net::{HttpNetwork, Network};
pub use store::{CacheStorage, CachedEntry, DiskStorage, MemoryStorage};
pub use strategy::{Served, Source};
pub use version::{Purpose, StoreName, Version};

//! Network access for the interception layer.
//!
//! Strategies talk to the network only through the `Network` trait so
//! tests can script latency and outages. `HttpNetwork` is the real
//! implementation on top of reqwest.

pub mod client;

pub use client::HttpNetwork;

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::http::{Request, Response};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Ask intermediate HTTP caches to revalidate with the origin
    pub bypass_http_cache: bool,
}

impl FetchOptions {
    pub fn no_cache() -> Self {
        Self {
            bypass_http_cache: true,
        }
    }
}

/// A non-2xx status is still `Ok`; only transport failures are errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request, options: FetchOptions)
        -> Result<Response, NetworkError>;
}

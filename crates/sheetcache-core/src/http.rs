//! Request and response snapshots as seen by the interception layer.

use reqwest::{Method, Url};

/// Header attached to responses the layer fabricates itself
pub const SYNTHETIC_HEADER: &str = "x-sheetcache-synthetic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    Cors,
    NoCors,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Cors,
            headers: Vec::new(),
        }
    }

    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// GET and HEAD are the only side-effect-free methods the layer handles
    pub fn is_idempotent_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::from_url(&self.url)
    }
}

/// Identity of a cached request: the URL without its fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.into())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complete response snapshot: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub url: Option<String>,
}

impl Response {
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.into(),
            url: None,
        }
    }

    /// Synthetic 503 returned when a data feed is down and nothing valid is cached.
    /// Callers must not try to parse the body as data.
    pub fn unavailable() -> Self {
        let mut response = Self::new(503, "text/plain; charset=utf-8", "Service Unavailable");
        response
            .headers
            .push((SYNTHETIC_HEADER.to_string(), "unavailable".to_string()));
        response
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_synthetic(&self) -> bool {
        self.header(SYNTHETIC_HEADER).is_some()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Mime essence of the declared content type, lowercased, parameters dropped
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_drops_fragment() {
        let url = Url::parse("https://example.test/app/index.html#roster").unwrap();
        assert_eq!(
            CacheKey::from_url(&url).as_str(),
            "https://example.test/app/index.html"
        );
    }

    #[test]
    fn test_content_type_essence() {
        let mut response = Response::new(200, "Text/CSV; charset=utf-8", "a,b\n");
        assert_eq!(response.content_type().as_deref(), Some("text/csv"));

        response.headers.clear();
        assert_eq!(response.content_type(), None);
    }

    #[test]
    fn test_unavailable_is_synthetic_503() {
        let response = Response::unavailable();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert!(response.is_synthetic());
        assert_eq!(response.content_type().as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_idempotent_read_methods() {
        let url = Url::parse("https://example.test/").unwrap();
        assert!(Request::get(url.clone()).is_idempotent_read());
        assert!(Request::get(url.clone()).with_method(Method::HEAD).is_idempotent_read());
        assert!(!Request::get(url).with_method(Method::POST).is_idempotent_read());
    }
}

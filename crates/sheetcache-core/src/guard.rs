//! Data-feed payload guard.
//!
//! Upstream outages and login walls answer data requests with an HTML page.
//! Such a body must never land in the data store, and callers use the same
//! check before parsing a feed.

/// Number of leading bytes inspected when sniffing for markup
const SNIFF_LEN: usize = 32;

pub fn looks_like_markup(body: &[u8]) -> bool {
    let head = &body[..body.len().min(SNIFF_LEN)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    head.contains("<!doctype") || head.contains("<html")
}

/// Content types accepted as data for the dynamic store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeGuard {
    accepted: Vec<String>,
}

impl ContentTypeGuard {
    pub fn new<I, S>(accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            accepted: accepted
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// `content_type` is a mime essence as returned by `Response::content_type`
    pub fn accepts(&self, content_type: Option<&str>) -> bool {
        match content_type {
            Some(ct) => self.accepted.iter().any(|a| a == ct),
            None => false,
        }
    }
}

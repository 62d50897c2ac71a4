//! Request classification.
//!
//! Rules, first match wins:
//! 1. navigations load the application shell
//! 2. same origin as the application scope is one of our own assets
//! 3. everything else is a third-party data feed
//!
//! Requests that are not GET/HEAD are never intercepted.

use reqwest::Url;

use crate::http::{Request, RequestMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Navigation,
    SameOriginStatic,
    RemoteDynamic,
}

impl ResourceClass {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceClass::Navigation => "navigation",
            ResourceClass::SameOriginStatic => "same-origin-static",
            ResourceClass::RemoteDynamic => "remote-dynamic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// Hand the request to the network untouched
    Passthrough,
    Handle(ResourceClass),
}

pub fn classify(request: &Request, scope: &Url) -> Interception {
    if !request.is_idempotent_read() {
        return Interception::Passthrough;
    }
    let class = if request.mode == RequestMode::Navigate {
        ResourceClass::Navigation
    } else if request.url.origin() == scope.origin() {
        ResourceClass::SameOriginStatic
    } else {
        ResourceClass::RemoteDynamic
    };
    Interception::Handle(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn scope() -> Url {
        Url::parse("https://lookup.example.test/pkgo/").unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_navigation_takes_priority() {
        // Even a cross-origin navigation is a navigation
        let req = Request::navigate(url("https://other.example.test/"));
        assert_eq!(
            classify(&req, &scope()),
            Interception::Handle(ResourceClass::Navigation)
        );
    }

    #[test]
    fn test_same_origin_asset() {
        let req = Request::get(url("https://lookup.example.test/pkgo/styles.css"))
            .with_mode(RequestMode::SameOrigin);
        assert_eq!(
            classify(&req, &scope()),
            Interception::Handle(ResourceClass::SameOriginStatic)
        );
    }

    #[test]
    fn test_port_and_scheme_are_part_of_origin() {
        let other_port = Request::get(url("https://lookup.example.test:8443/pkgo/main.js"));
        let other_scheme = Request::get(url("http://lookup.example.test/pkgo/main.js"));
        for req in [other_port, other_scheme] {
            assert_eq!(
                classify(&req, &scope()),
                Interception::Handle(ResourceClass::RemoteDynamic)
            );
        }
    }

    #[test]
    fn test_remote_feed() {
        let req = Request::get(url(
            "https://docs.google.com/spreadsheets/d/abc/export?format=csv",
        ));
        assert_eq!(
            classify(&req, &scope()),
            Interception::Handle(ResourceClass::RemoteDynamic)
        );
    }

    #[test]
    fn test_non_get_passes_through() {
        for method in [Method::POST, Method::PUT, Method::DELETE] {
            let req = Request::navigate(url("https://lookup.example.test/pkgo/")).with_method(method);
            assert_eq!(classify(&req, &scope()), Interception::Passthrough);
        }
    }

    #[test]
    fn test_classification_is_stable() {
        let req = Request::get(url("https://lookup.example.test/pkgo/manifest.json"));
        assert_eq!(classify(&req, &scope()), classify(&req, &scope()));
    }
}

//! Request classification.
//!
//! Pure mapping from method and URL to a [`Route`]; no I/O and no state
//! beyond the configured origin and prefixes.

use std::fmt;

use axum::http::Method;
use fieldcache_core::InterceptedRequest;
use url::Url;

/// Category of an intercepted GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Same-origin API call; network-first against the API store.
    Api,
    /// Generated document; always network-only, never cached.
    Report,
    /// Any other same-origin GET; network-first against the static store.
    SameOriginPage,
    /// Cross-origin asset (fonts, map library); cache-first.
    ExternalStatic,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteClass::Api => "api",
            RouteClass::Report => "report",
            RouteClass::SameOriginPage => "page",
            RouteClass::ExternalStatic => "external-static",
        })
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not a GET: forwarded untouched.
    Passthrough,
    Intercept(RouteClass),
}

/// Origin and prefixes the router matches against.
#[derive(Debug, Clone)]
pub struct RouteRules {
    origin: Url,
    api_prefix: String,
    report_prefix: String,
}

impl RouteRules {
    pub fn new(origin: Url, api_prefix: impl Into<String>, report_prefix: impl Into<String>) -> Self {
        Self { origin, api_prefix: api_prefix.into(), report_prefix: report_prefix.into() }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Route {
        if request.method != Method::GET {
            return Route::Passthrough;
        }

        let url = &request.url;
        if !self.is_same_origin(url) {
            return Route::Intercept(RouteClass::ExternalStatic);
        }

        let path = url.path();
        if path.starts_with(&self.api_prefix) {
            Route::Intercept(RouteClass::Api)
        } else if path.starts_with(&self.report_prefix) {
            Route::Intercept(RouteClass::Report)
        } else {
            Route::Intercept(RouteClass::SameOriginPage)
        }
    }
}

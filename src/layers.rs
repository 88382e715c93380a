//! HTTP hardening layers for Axum routers

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::{
    limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;

/// Extension trait that wraps a router in the service's HTTP layers.
///
/// ```ignore
/// let app = portcullis::routes::router(state).with_security(config.http.clone());
/// ```
pub trait SecureRouter {
    /// Apply, from outermost to innermost:
    ///
    /// 1. TraceLayer
    /// 2. Response security headers
    /// 3. Request body limit
    /// 4. Request timeout
    fn with_security(self, config: HttpConfig) -> Self;
}

impl<S> SecureRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(self, config: HttpConfig) -> Self {
        // Dropping the handler future on timeout cancels its store and
        // cache calls with it
        let mut router = self
            .layer(TimeoutLayer::new(config.request_timeout))
            .layer(RequestBodyLimitLayer::new(config.max_request_size));

        if config.security_headers_enabled {
            router = router
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                // Session responses must never be cached
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                ));
        }

        if config.tracing_enabled {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }
}

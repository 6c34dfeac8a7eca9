use std::sync::Arc;

use axum::Router;
use axum::extract::{OriginalUri, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::cache::SharedCache;
use crate::http::AppError;

/// Derives the cache key of a request.
pub type KeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Read-through gate in front of a handler chain.
///
/// On a hit the cached body is the response and nothing downstream runs.
/// A missing cache, an empty key, a miss, an empty cached value, or a failing
/// lookup all let the request through untouched.
#[derive(Clone)]
pub struct CacheGate {
    cache: SharedCache,
    key: KeyFn,
}

impl CacheGate {
    pub fn new<F>(cache: SharedCache, key: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        Self {
            cache,
            key: Arc::new(key),
        }
    }

    /// Gate keyed on the path and query the client sent, e.g.
    /// `/v1/items/42?full=1`, even when the gated router is nested.
    pub fn by_uri(cache: SharedCache) -> Self {
        Self::new(cache, |request| {
            let uri = request
                .extensions()
                .get::<OriginalUri>()
                .map_or(request.uri(), |original| &original.0);
            uri.path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default()
        })
    }

    /// Puts the gate in front of every route of `router`.
    pub fn wrap<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self, cache_gate))
    }
}

/// Middleware function behind `CacheGate`. Usable directly with
/// `axum::middleware::from_fn_with_state` on single routes.
pub async fn cache_gate(
    State(gate): State<CacheGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(store) = gate.cache.handle() else {
        return Ok(next.run(request).await);
    };

    let key = (gate.key)(&request);
    if key.is_empty() {
        return Ok(next.run(request).await);
    }

    match store.get(&key).await {
        Ok(Some(cached)) if !cached.is_empty() => {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(&cached) {
                error!(key = %key, "Cached response is not valid JSON: {e}");
                return Err(AppError::internal("Error on cache middleware"));
            }
            debug!(key = %key, "Cache hit");
            Ok(([(header::CONTENT_TYPE, "application/json")], cached).into_response())
        }
        Ok(_) => Ok(next.run(request).await),
        Err(e) => {
            warn!(key = %key, "Cache lookup failed: {e}");
            Ok(next.run(request).await)
        }
    }
}

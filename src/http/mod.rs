//! The `http` module assembles the request-handling front end: versioned
//! route modules, the health endpoint, the real-time upgrade route, the
//! static-file fallback and the centralized error formatter.

pub mod error;
pub mod health;
pub mod mime;
pub mod routes;
pub mod static_files;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, OriginalUri, State};
use axum::middleware;
use axum::routing::get;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use error::AppError;
pub use routes::RouteModule;
pub use static_files::StaticFiles;

use crate::config::Settings;
use crate::realtime::{self, RealtimeSlot};

/// Largest request body accepted, in bytes.
pub const BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Builds the service router.
///
/// Route modules are mounted under the configured version, `/status` is
/// always served, the real-time upgrade lives at the configured path and
/// every other request, including a known path with the wrong method, falls
/// through to the static file tree. Every error leaves as an `AppError` body.
pub fn build_router(settings: &Settings, modules: Vec<RouteModule>, realtime: RealtimeSlot) -> Router {
    let mut router = Router::new().route("/status", get(health::status));

    for module in modules {
        router = routes::mount(router, &settings.app.version, module);
    }

    let realtime_routes = Router::new()
        .route(&settings.realtime.path, get(realtime::upgrade))
        .with_state(realtime);

    let files = Arc::new(StaticFiles::new(&settings.static_files.root));
    let fallback = Router::new()
        .fallback(static_files::serve)
        .with_state(files.clone());

    // A known path hit with the wrong method is treated like any unmatched
    // request.
    router
        .merge(realtime_routes)
        .merge(fallback)
        .method_not_allowed_fallback(move |uri: OriginalUri| {
            static_files::serve(State(files.clone()), uri)
        })
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(middleware::map_response(error::json_errors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::http::error::AppError;
use crate::http::mime;

/// Local file tree answering requests no route matched.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a request path onto the tree. Paths that would leave the root
    /// resolve to nothing.
    pub(crate) fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }
}

/// Fallback handler: serves the file by extension-derived content type, or
/// a 404 naming the requested URI.
pub async fn serve(
    State(files): State<Arc<StaticFiles>>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, AppError> {
    let original = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());

    let content_type = Path::new(uri.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime::content_type)
        .ok_or_else(|| AppError::not_found(&original))?;

    let file = files
        .resolve(uri.path())
        .ok_or_else(|| AppError::not_found(&original))?;

    match tokio::fs::read(&file).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response()),
        Err(e) => {
            debug!(path = %file.display(), "Static file unavailable: {e}");
            Err(AppError::not_found(&original))
        }
    }
}

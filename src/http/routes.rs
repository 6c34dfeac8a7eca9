use axum::Router;

/// An externally supplied group of routes, mounted under
/// `/<service version><path>`.
///
/// The router carries its own state; the bootstrap only decides where it
/// lives in the URL space.
#[derive(Debug, Clone)]
pub struct RouteModule {
    pub path: String,
    pub router: Router,
}

impl RouteModule {
    pub fn new(path: impl Into<String>, router: Router) -> Self {
        Self {
            path: path.into(),
            router,
        }
    }
}

/// Joins the service version and a module path into a mount point.
///
/// Slashes are normalised so `("v1", "items")`, `("/v1/", "/items/")` and
/// `("v1", "/items")` all give `/v1/items`. An empty result is `/`.
pub fn mount_path(version: &str, path: &str) -> String {
    let segments: Vec<&str> = [version, path]
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();

    format!("/{}", segments.join("/"))
}

/// Attaches `module` to `router` under the versioned prefix.
pub fn mount(router: Router, version: &str, module: RouteModule) -> Router {
    let at = mount_path(version, &module.path);
    if at == "/" {
        router.merge(module.router)
    } else {
        router.nest(&at, module.router)
    }
}

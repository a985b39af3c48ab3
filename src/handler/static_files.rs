//! Static file serving module
//!
//! Serves the frontend: `index.html`, stylesheets at the root, `js/` and `assets/`.
//! Every lookup is confined to the directory its route maps to.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, CachePolicy};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const INDEX_FILE: &str = "index.html";
pub const JS_DIR: &str = "js";
pub const ASSETS_DIR: &str = "assets";

/// A frontend route resolved from the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRoute<'a> {
    /// `/` → `<root>/index.html`
    Index,
    /// `/<name>.css` → `<root>/<name>.css`
    Stylesheet(&'a str),
    /// `/js/<name>` → `<root>/js/<name>`
    Script(&'a str),
    /// `/assets/<name>` → `<root>/assets/<name>`
    Asset(&'a str),
}

impl<'a> StaticRoute<'a> {
    /// Match a request path against the frontend routes
    pub fn resolve(path: &'a str) -> Option<Self> {
        if path == "/" {
            return Some(Self::Index);
        }
        if let Some(name) = path.strip_prefix("/js/") {
            return (!name.is_empty()).then_some(Self::Script(name));
        }
        if let Some(name) = path.strip_prefix("/assets/") {
            return (!name.is_empty()).then_some(Self::Asset(name));
        }
        let name = path.strip_prefix('/')?;
        let stem = name.strip_suffix(".css")?;
        (!stem.is_empty()).then_some(Self::Stylesheet(name))
    }

    /// Directory the route is confined to, and the file within it
    fn location(self, root: &Path) -> (PathBuf, &'a str) {
        match self {
            Self::Index => (root.to_path_buf(), INDEX_FILE),
            Self::Stylesheet(name) => (root.to_path_buf(), name),
            Self::Script(name) => (root.join(JS_DIR), name),
            Self::Asset(name) => (root.join(ASSETS_DIR), name),
        }
    }

    /// The entry page revalidates on every load; everything else caches
    const fn cache_policy(self) -> CachePolicy {
        match self {
            Self::Index => CachePolicy::NoCache,
            _ => CachePolicy::ASSETS,
        }
    }
}

/// Serve a resolved frontend route
pub async fn serve(
    ctx: &RequestContext<'_>,
    route: StaticRoute<'_>,
    root: &Path,
) -> Response<Full<Bytes>> {
    let (dir, relative) = route.location(root);
    match load_from_directory(&dir, relative).await {
        Some((content, content_type)) => build_static_file_response(
            content,
            content_type,
            route.cache_policy(),
            ctx.if_none_match.as_deref(),
            ctx.is_head,
        ),
        None => http::build_404_response(),
    }
}

/// Load a file from `dir`, refusing anything that resolves outside it
pub async fn load_from_directory(dir: &Path, relative: &str) -> Option<(Vec<u8>, &'static str)> {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() || relative.contains('\0') {
        return None;
    }

    let dir_canonical = match fs::canonicalize(dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                dir.display()
            ));
            return None;
        }
    };

    // File not found is common (404), no need to log at warning level
    let file_canonical = fs::canonicalize(dir.join(relative)).await.ok()?;
    if !file_canonical.starts_with(&dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {relative} -> {}",
            file_canonical.display()
        ));
        return None;
    }
    if !fs::metadata(&file_canonical).await.ok()?.is_file() {
        return None;
    }

    let content = match fs::read(&file_canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                file_canonical.display()
            ));
            return None;
        }
    };

    Some((content, mime::for_path(&file_canonical)))
}

/// Build static file response with `ETag` support
fn build_static_file_response(
    data: Vec<u8>,
    content_type: &str,
    policy: CachePolicy,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&data);

    // Check if client has cached version
    if cache::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag, policy);
    }

    http::build_cached_response(Bytes::from(data), content_type, &etag, policy, is_head)
}

//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation, route matching, and dispatching.

use crate::config::{AppState, DetectionMode};
use crate::handler::detect;
use crate::handler::static_files::{self, StaticRoute};
use crate::http::{self, DETECT_ALLOW, STATIC_ALLOW};
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{header, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

pub const API_DETECT: &str = "/api/detect";
pub const API_HEALTH: &str = "/api/health";

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    mode: DetectionMode,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let access_log = state.config.logging.access_log;
    let mut entry = access_log.then(|| access_entry(&req, peer_addr));

    let mut response = route_request(req, &state).await;
    if let Ok(server) = header::HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(header::SERVER, server);
    }

    if let Some(entry) = entry.as_mut() {
        let body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.finish(response.status().as_u16(), body_bytes, started.elapsed());
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header_value = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header_value(header::REFERER);
    entry.user_agent = header_value(header::USER_AGENT);
    entry
}

/// Route request based on path and method
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let enable_cors = state.config.http.enable_cors;
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // 1. Detection API
    if path == API_DETECT {
        return match method {
            Method::POST => detect::handle_detect(req, state).await,
            Method::OPTIONS => http::build_options_response(DETECT_ALLOW, enable_cors),
            _ => method_not_allowed(&method, DETECT_ALLOW),
        };
    }

    // 2. Health check
    if path == API_HEALTH {
        return match method {
            Method::GET | Method::HEAD => {
                let health = HealthResponse {
                    status: "ok",
                    version: env!("CARGO_PKG_VERSION"),
                    mode: state.detector.mode(),
                };
                http::build_json_response(StatusCode::OK, &health, enable_cors)
            }
            Method::OPTIONS => http::build_options_response(STATIC_ALLOW, enable_cors),
            _ => method_not_allowed(&method, STATIC_ALLOW),
        };
    }

    // 3. Frontend
    let Some(route) = StaticRoute::resolve(&path) else {
        return http::build_404_response();
    };
    match method {
        Method::GET | Method::HEAD => {
            let ctx = RequestContext {
                path: &path,
                is_head: method == Method::HEAD,
                if_none_match: req
                    .headers()
                    .get(header::IF_NONE_MATCH)
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string),
            };
            static_files::serve(&ctx, route, &state.config.frontend.root).await
        }
        Method::OPTIONS => http::build_options_response(STATIC_ALLOW, enable_cors),
        _ => method_not_allowed(&method, STATIC_ALLOW),
    }
}

fn method_not_allowed(method: &Method, allow: &str) -> Response<Full<Bytes>> {
    logger::log_warning(&format!("Method not allowed: {method}"));
    http::build_405_response(allow)
}

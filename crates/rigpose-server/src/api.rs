//! Request routing and the JSON API handlers.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /api/poses` | cached world-frame poses for every frame |
//! | `GET /api/poses/schema` | JSON Schema of one pose entry |
//! | `GET /api/images` | frame image listing |
//! | `GET /api/video-info` | secondary video path and existence |
//! | `GET /api/secondary-video` | secondary video bytes, single byte ranges honoured |
//! | `GET /images/<name>` | one file from the image directory |
//! | `OPTIONS *` | CORS preflight |
//!
//! `HEAD` is routed like `GET` and answered without a body.

use std::path::PathBuf;
use std::sync::Arc;

use rigpose_runtime::PoseResolver;
use rigpose_types::{FramePose, RigError};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::http::{Request, Response};
use crate::images::{ImagePattern, list_images};

/// Default origins allowed to call the API from a browser.
pub fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

/// Shared state handed to every connection.
pub struct AppState {
    pub resolver: Arc<PoseResolver>,
    pub image_dir: Option<PathBuf>,
    pub image_pattern: ImagePattern,
    pub secondary_video: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(resolver: Arc<PoseResolver>) -> Self {
        Self {
            resolver,
            image_dir: None,
            image_pattern: ImagePattern::default(),
            secondary_video: None,
            allowed_origins: default_allowed_origins(),
        }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Route `req` and attach CORS headers.
pub async fn handle_request(req: &Request, state: &Arc<AppState>) -> Response {
    if req.method == "OPTIONS" {
        return preflight(req, state);
    }

    let head_only = req.method == "HEAD";
    let response = if req.method != "GET" && !head_only {
        Response::error(405, "method not allowed").with_header("Allow", "GET, HEAD, OPTIONS")
    } else {
        match req.path.as_str() {
            "/api/poses" => poses(state).await,
            "/api/poses/schema" => Response::json(200, &schemars::schema_for!(FramePose)),
            "/api/images" => images(state).await,
            "/api/video-info" => video_info(state).await,
            "/api/secondary-video" => secondary_video(req, state).await,
            path => match path.strip_prefix("/images/") {
                Some(name) => image_file(name, state).await,
                None => Response::error(404, "not found"),
            },
        }
    };

    let response = with_cors(response, req, state);
    if head_only {
        response.without_body()
    } else {
        response
    }
}

fn with_cors(response: Response, req: &Request, state: &AppState) -> Response {
    match req.header("origin") {
        Some(origin) if state.origin_allowed(origin) => response
            .with_header("Access-Control-Allow-Origin", origin)
            .with_header("Access-Control-Allow-Credentials", "true")
            .with_header("Vary", "Origin"),
        _ => response,
    }
}

fn preflight(req: &Request, state: &AppState) -> Response {
    let Some(origin) = req.header("origin") else {
        return Response::error(400, "missing Origin header");
    };
    if !state.origin_allowed(origin) {
        return Response::error(400, "Disallowed CORS origin");
    }
    let mut response = Response::empty(204)
        .with_header("Access-Control-Allow-Origin", origin)
        .with_header("Access-Control-Allow-Credentials", "true")
        .with_header("Access-Control-Allow-Methods", "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT")
        .with_header("Access-Control-Max-Age", "600")
        .with_header("Vary", "Origin");
    if let Some(requested) = req.header("access-control-request-headers") {
        response = response.with_header("Access-Control-Allow-Headers", requested);
    }
    response
}

#[derive(Serialize)]
struct PosesBody<'a> {
    poses: &'a [FramePose],
}

/// Map an error from the blocking pool into a 500.
fn join_failure(e: tokio::task::JoinError) -> Response {
    error!(error = %e, "blocking task failed");
    Response::error(500, "internal error")
}

async fn poses(state: &Arc<AppState>) -> Response {
    let resolver = Arc::clone(&state.resolver);
    match tokio::task::spawn_blocking(move || resolver.poses()).await {
        Ok(Ok(poses)) => Response::json(200, &PosesBody { poses: &poses }),
        Ok(Err(e)) => {
            error!(error = %e, "pose resolution failed");
            Response::error(500, &e.to_string())
        }
        Err(e) => join_failure(e),
    }
}

async fn images(state: &Arc<AppState>) -> Response {
    let Some(dir) = state.image_dir.clone() else {
        return Response::json(200, &crate::images::build_listing(Vec::new(), &state.image_pattern));
    };
    let pattern = state.image_pattern.clone();
    match tokio::task::spawn_blocking(move || list_images(&dir, &pattern)).await {
        Ok(Ok(listing)) => Response::json(200, &listing),
        Ok(Err(e)) => {
            error!(error = %e, "image listing failed");
            Response::error(500, &e.to_string())
        }
        Err(e) => join_failure(e),
    }
}

async fn video_exists(state: &AppState) -> bool {
    match &state.secondary_video {
        Some(path) => tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false),
        None => false,
    }
}

async fn video_info(state: &Arc<AppState>) -> Response {
    let path = state
        .secondary_video
        .as_ref()
        .map(|p| p.display().to_string());
    Response::json(
        200,
        &json!({ "path": path, "exists": video_exists(state).await }),
    )
}

/// Content type of a frame image, by extension.
fn image_content_type(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// `GET /images/<name>` – one file from the image directory.
///
/// `name` must be a bare file name.  Separators, `..` and percent escapes
/// are answered 404, so nothing outside the directory is reachable.
async fn image_file(name: &str, state: &Arc<AppState>) -> Response {
    let Some(dir) = state.image_dir.as_ref() else {
        return Response::error(404, "not found");
    };
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0', '%'])
    {
        warn!(name, "rejected image path");
        return Response::error(404, "not found");
    }

    let path = dir.join(name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {
            Response::from_file(200, image_content_type(name), path, 0, meta.len())
        }
        Ok(_) => Response::error(404, "not found"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Response::error(404, "not found"),
        Err(e) => {
            let e = RigError::Io(format!("failed to stat {}: {}", path.display(), e));
            error!(error = %e, "image lookup failed");
            Response::error(500, &e.to_string())
        }
    }
}

async fn secondary_video(req: &Request, state: &Arc<AppState>) -> Response {
    let Some(path) = state.secondary_video.as_ref() else {
        return Response::json(200, &json!({ "error": "Video not found" }));
    };
    let total = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return Response::json(200, &json!({ "error": "Video not found" })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Response::json(200, &json!({ "error": "Video not found" }));
        }
        Err(e) => {
            let e = RigError::Io(format!("failed to stat {}: {}", path.display(), e));
            error!(error = %e, "secondary video lookup failed");
            return Response::error(500, &e.to_string());
        }
    };

    match req.header("range").map(|r| parse_byte_range(r, total)) {
        None => Response::from_file(200, "video/mp4", path, 0, total)
            .with_header("Accept-Ranges", "bytes"),
        Some(Some((start, end))) => {
            Response::from_file(206, "video/mp4", path, start, end - start + 1)
                .with_header("Accept-Ranges", "bytes")
                .with_header("Content-Range", &format!("bytes {start}-{end}/{total}"))
        }
        Some(None) => {
            warn!(range = ?req.header("range"), total, "unsatisfiable range");
            Response::empty(416).with_header("Content-Range", &format!("bytes */{total}"))
        }
    }
}

/// Parse a single `bytes=` range against a body of `total` bytes.
///
/// Supports `start-end`, `start-`, and suffix `-len`.  Returns the inclusive
/// `(start, end)` or `None` if the range is malformed or unsatisfiable.
pub fn parse_byte_range(header: &str, total: u64) -> Option<(u64, u64)> {
    let range = header.trim().strip_prefix("bytes=")?;
    if range.contains(',') || total == 0 {
        return None;
    }
    let (start, end) = range.split_once('-')?;
    let (start, end) = match (start.trim(), end.trim()) {
        ("", suffix) => {
            let len: u64 = suffix.parse().ok()?;
            if len == 0 {
                return None;
            }
            (total.saturating_sub(len), total - 1)
        }
        (start, "") => (start.parse().ok()?, total - 1),
        (start, end) => {
            let end: u64 = end.parse().ok()?;
            (start.parse().ok()?, end.min(total - 1))
        }
    };
    (start <= end && start < total).then_some((start, end))
}

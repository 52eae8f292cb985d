use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use dbfs_core::format::ExportFormat;

use super::dav::Depth;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_BYTES: usize = 128;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

/// What a successful response carried; handlers attach it as a response extension so the
/// access line can name it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Served {
    Listing { entries: usize },
    Artifact(ExportFormat),
    Multistatus { depth: Depth, entries: usize },
    Options,
}

impl fmt::Display for Served {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Served::Listing { entries } => write!(f, "listing({entries})"),
            Served::Artifact(format) => write!(f, "artifact({format})"),
            Served::Multistatus { depth, entries } => {
                let depth = match depth {
                    Depth::Zero => 0,
                    Depth::One => 1,
                };
                write!(f, "multistatus(depth={depth}, {entries})")
            }
            Served::Options => f.write_str("options"),
        }
    }
}

/// Client-supplied id when it is short and made of `[A-Za-z0-9_-]`, otherwise a fresh one.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| accepts_request_id(value))
        .map(str::to_owned)
        .unwrap_or_else(new_request_id)
}

fn accepts_request_id(value: &str) -> bool {
    (1..=MAX_REQUEST_ID_BYTES).contains(&value.len())
        && value
            .bytes()
            .all(|byte| matches!(byte, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_'))
}

/// `dbfs-<pid>-<start ms>-<seq>` in hex.
fn new_request_id() -> String {
    let started_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();
    let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("dbfs-{:x}-{started_ms:x}-{seq:x}", std::process::id())
}

/// Runs each request inside a span keyed by its id, echoes the id on the response and
/// writes one access line with status, latency and what was served.
pub(super) async fn request_id_middleware(req: Request, next: Next) -> Response {
    let id = request_id(req.headers());
    let span = tracing::info_span!(
        "http_request",
        request_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let started = Instant::now();
    let mut resp = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| access_line(&resp, started));

    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    resp
}

fn access_line(resp: &Response, started: Instant) {
    let status = resp.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match resp.extensions().get::<Served>() {
        Some(served) => tracing::info!(status, elapsed_ms, served = %served, "request served"),
        None if resp.status().is_server_error() => {
            tracing::warn!(status, elapsed_ms, "request failed")
        }
        None => tracing::info!(status, elapsed_ms, "request rejected"),
    }
}

//! HTTP server implementation: a read-only WebDAV subset over the resource tree.

mod auth;
mod dav;
mod handlers;
mod layers;
mod runner;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::any;

use dbfs::Provider;
use dbfs_core::config::{FsConfig, Limits};

#[derive(Clone)]
struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    provider: Provider,
    limits: Limits,
    auth: auth::AuthMode,
    io_concurrency: Arc<tokio::sync::Semaphore>,
}

#[derive(Debug, serde::Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

fn err(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            code,
            message: message.into(),
        }),
    )
}

fn err_response(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    err(status, code, message).into_response()
}

fn map_err(err: dbfs_core::Error) -> (StatusCode, Json<ErrorBody>) {
    let code = err.code();
    let status = match code {
        "invalid_path" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "storage_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "cancelled" => StatusCode::REQUEST_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status.is_server_error() {
        tracing::error!(code, err = %err, "dbfs request failed");
        match status {
            StatusCode::SERVICE_UNAVAILABLE => "storage unavailable".to_string(),
            _ => "internal error".to_string(),
        }
    } else {
        err.to_string()
    };

    (status, Json(ErrorBody { code, message }))
}

fn build_state(config: FsConfig) -> anyhow::Result<AppState> {
    let provider = Provider::new(&config).map_err(anyhow::Error::msg)?;
    let auth = auth::build_auth_mode(&config.auth)?;
    let io_concurrency = config.limits.max_concurrency_io;

    Ok(AppState {
        inner: Arc::new(AppInner {
            provider,
            limits: config.limits,
            auth,
            io_concurrency: Arc::new(tokio::sync::Semaphore::new(io_concurrency)),
        }),
    })
}

/// Builds the router serving `config`'s databases. Fails on invalid configuration,
/// including an auth section that neither allows anonymous access nor lists users.
pub fn build_app(config: FsConfig) -> anyhow::Result<Router> {
    let state = build_state(config)?;

    Ok(Router::new()
        .route("/", any(handlers::root))
        .route("/{*path}", any(handlers::entry))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn(layers::request_id_middleware))
        .with_state(state))
}

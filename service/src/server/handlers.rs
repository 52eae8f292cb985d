use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use dbfs::{Provider, Resource, TableArtifact};

use super::dav::{self, Depth};
use super::layers::Served;

const ALLOW: &str = "OPTIONS, GET, HEAD, PROPFIND";

type HandlerResult = Result<Response, (StatusCode, Json<super::ErrorBody>)>;

#[derive(Debug, Serialize)]
struct Listing {
    path: String,
    entries: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct Entry {
    name: String,
    kind: EntryKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum EntryKind {
    Collection,
    File,
}

enum Fetched {
    File(TableArtifact),
    Listing(Listing),
}

pub(super) async fn root(
    State(state): State<super::AppState>,
    method: Method,
    headers: HeaderMap,
) -> HandlerResult {
    dispatch(state, method, &headers, String::new()).await
}

pub(super) async fn entry(
    State(state): State<super::AppState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> HandlerResult {
    dispatch(state, method, &headers, path).await
}

async fn dispatch(
    state: super::AppState,
    method: Method,
    headers: &HeaderMap,
    path: String,
) -> HandlerResult {
    if method == Method::GET || method == Method::HEAD {
        get(state, path, method == Method::HEAD).await
    } else if method == Method::OPTIONS {
        Ok(options())
    } else if method.as_str() == "PROPFIND" {
        propfind(state, headers, path).await
    } else {
        let mut resp = super::err_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            format!("{method} is not supported on a read-only tree"),
        );
        resp.headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static(ALLOW));
        Ok(resp)
    }
}

async fn get(state: super::AppState, path: String, head_only: bool) -> HandlerResult {
    let permit = super::runner::acquire(&state).await?;
    let fetched = super::runner::run_tree(state.clone(), permit, move |provider| {
        fetch(provider, &path)
    })
    .await?;

    let artifact = match fetched {
        Fetched::Listing(listing) => {
            let served = Served::Listing {
                entries: listing.entries.len(),
            };
            return Ok(with_served(Json(listing).into_response(), served));
        }
        Fetched::File(artifact) => artifact,
    };
    let served = Served::Artifact(artifact.format());
    let content_type = [(header::CONTENT_TYPE, artifact.content_type())];
    if head_only {
        let resp = (content_type, Body::empty()).into_response();
        return Ok(with_served(resp, served));
    }
    let permit = super::runner::acquire(&state).await?;
    let body = super::runner::stream_artifact(&state, permit, artifact);
    Ok(with_served((content_type, body).into_response(), served))
}

fn with_served(mut resp: Response, served: Served) -> Response {
    resp.extensions_mut().insert(served);
    resp
}

fn fetch(provider: &Provider, path: &str) -> dbfs::Result<Fetched> {
    match provider.resolve(path)? {
        Resource::Artifact(artifact) => Ok(Fetched::File(artifact)),
        Resource::Collection(collection) => {
            let entries = collection
                .children()?
                .iter()
                .map(|child| Entry {
                    name: child.name().to_string(),
                    kind: if child.is_collection() {
                        EntryKind::Collection
                    } else {
                        EntryKind::File
                    },
                })
                .collect();
            Ok(Fetched::Listing(Listing {
                path: collection.path().to_string(),
                entries,
            }))
        }
    }
}

fn options() -> Response {
    let resp = (
        StatusCode::OK,
        [
            (header::ALLOW, HeaderValue::from_static(ALLOW)),
            (
                header::HeaderName::from_static("dav"),
                HeaderValue::from_static("1"),
            ),
        ],
    )
        .into_response();
    with_served(resp, Served::Options)
}

async fn propfind(state: super::AppState, headers: &HeaderMap, path: String) -> HandlerResult {
    let raw_depth = match headers.get("depth") {
        Some(value) => Some(value.to_str().map_err(|_| bad_depth())?),
        None => None,
    };
    let depth = Depth::parse(raw_depth).ok_or_else(bad_depth)?;

    let permit = super::runner::acquire(&state).await?;
    let (body, entries) = super::runner::run_tree(state, permit, move |provider| {
        dav::propfind(provider, &path, depth)
    })
    .await?;

    let resp = (
        StatusCode::MULTI_STATUS,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response();
    Ok(with_served(resp, Served::Multistatus { depth, entries }))
}

fn bad_depth() -> (StatusCode, Json<super::ErrorBody>) {
    super::err(
        StatusCode::BAD_REQUEST,
        "invalid_depth",
        "Depth must be 0, 1 or infinity",
    )
}

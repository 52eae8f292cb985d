use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use dbfs_core::config::AuthConfig;

const MAX_CREDENTIALS_BYTES: usize = 4096;
const CHALLENGE: &str = "Basic realm=\"dbfs\"";

#[derive(Clone)]
pub(super) enum AuthMode {
    Anonymous,
    Basic { users: Arc<[Credential]> },
}

#[derive(Clone)]
pub(super) struct Credential {
    username: String,
    password_sha256: [u8; 32],
}

pub(super) fn build_auth_mode(auth: &AuthConfig) -> anyhow::Result<AuthMode> {
    auth.validate().map_err(anyhow::Error::msg)?;
    if auth.anonymous {
        return Ok(AuthMode::Anonymous);
    }

    let mut users = Vec::with_capacity(auth.users.len());
    for user in &auth.users {
        let password_sha256 = if user.password.starts_with("sha256:") {
            parse_password_sha256(&user.password)?
        } else {
            hash_password_sha256(&user.password)
        };
        users.push(Credential {
            username: user.username.clone(),
            password_sha256,
        });
    }

    Ok(AuthMode::Basic {
        users: Arc::from(users),
    })
}

fn parse_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = raw.split_whitespace();
    let scheme = parts.next()?;
    let encoded = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    if encoded.len() > MAX_CREDENTIALS_BYTES {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn hash_password_sha256(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

fn parse_password_sha256(value: &str) -> anyhow::Result<[u8; 32]> {
    let Some(hex) = value.strip_prefix("sha256:") else {
        anyhow::bail!("password hash must be sha256:<64 hex chars>");
    };
    let bytes = hex::decode(hex).map_err(anyhow::Error::msg)?;
    let hash: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("invalid sha256 password hash length"))?;
    Ok(hash)
}

fn constant_time_eq_32(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff: u8 = 0;
    for idx in 0..32 {
        diff |= a[idx] ^ b[idx];
    }
    diff == 0
}

fn match_credentials<'a>(
    users: &'a [Credential],
    username: &str,
    password: &str,
) -> Option<&'a Credential> {
    let actual = hash_password_sha256(password);
    users.iter().find(|user| {
        let password_ok = constant_time_eq_32(&user.password_sha256, &actual);
        password_ok && user.username == username
    })
}

fn challenge(message: &'static str) -> Response {
    let mut resp = super::err_response(StatusCode::UNAUTHORIZED, "unauthorized", message);
    resp.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(CHALLENGE),
    );
    resp
}

pub(super) async fn auth_middleware(
    State(state): State<super::AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let AuthMode::Basic { users } = &state.inner.auth {
        let Some((username, password)) = parse_basic_credentials(req.headers()) else {
            return challenge("missing or invalid Authorization header");
        };
        let Some(user) = match_credentials(users, &username, &password) else {
            tracing::debug!(username = %username, "rejected credentials");
            return challenge("invalid credentials");
        };
        tracing::debug!(username = %user.username, "authenticated");
    }

    next.run(req).await
}

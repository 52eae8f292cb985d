use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::format::ExportFormat;
use crate::{Error, Result};

/// Whether artifacts report their byte length before being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentLength {
    /// Length is unknown until the content has been streamed.
    #[default]
    Unknown,
    /// Length is computed by encoding the whole table once more into a counting sink.
    Computed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EscapeHatch {
    /// Resolve `/<absolute host path>` below the root when no configured database matches.
    #[serde(default)]
    pub enabled: bool,
    /// Follow symbolic links while walking the host filesystem.
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    /// Wall-clock budget for one request, in milliseconds.
    #[serde(default = "default_max_io_ms")]
    pub max_io_ms: u64,
    /// Max in-flight listing/read requests.
    #[serde(default = "default_max_concurrency_io")]
    pub max_concurrency_io: usize,
}

const fn default_max_io_ms() -> u64 {
    30_000
}

const fn default_max_concurrency_io() -> usize {
    16
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_io_ms: default_max_io_ms(),
            max_concurrency_io: default_max_concurrency_io(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthUser {
    pub username: String,
    /// Plaintext password, or `sha256:<64 hex chars>` of it.
    pub password: String,
}

impl fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Serve without credentials.
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.anonymous && self.users.is_empty() {
            return Err(Error::Config(
                "either configure a username and password or enable anonymous access".to_string(),
            ));
        }
        if self.users.len() > 256 {
            return Err(Error::Config(
                "auth.users has too many entries (max 256)".to_string(),
            ));
        }
        for (idx, user) in self.users.iter().enumerate() {
            if user.username.trim().is_empty() {
                return Err(Error::Config(format!(
                    "auth.users[{idx}].username must be non-empty"
                )));
            }
            if user.username.contains(':') {
                return Err(Error::Config(format!(
                    "auth.users[{idx}].username must not contain ':'"
                )));
            }
            if user.password.is_empty() {
                return Err(Error::Config(format!(
                    "auth.users[{idx}].password must be non-empty"
                )));
            }
            if let Some(hex) = user.password.strip_prefix("sha256:")
                && (hex.len() != 64 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()))
            {
                return Err(Error::Config(format!(
                    "auth.users[{idx}].password must be sha256:<64 hex chars>"
                )));
            }
        }
        Ok(())
    }
}

fn default_formats() -> Vec<ExportFormat> {
    ExportFormat::ALL.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsConfig {
    /// Database files served below the root, in listing order.
    #[serde(default)]
    pub databases: Vec<PathBuf>,
    /// Enabled export formats, in per-table listing order.
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,
    #[serde(default)]
    pub content_length: ContentLength,
    #[serde(default)]
    pub escape_hatch: EscapeHatch,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            formats: default_formats(),
            content_length: ContentLength::default(),
            escape_hatch: EscapeHatch::default(),
            limits: Limits::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl FsConfig {
    /// Checks everything the resource tree relies on. Authentication is validated
    /// separately by [`AuthConfig::validate`].
    pub fn validate(&self) -> Result<()> {
        if self.formats.is_empty() {
            return Err(Error::Config("formats must be non-empty".to_string()));
        }
        let mut seen_formats = HashSet::new();
        for format in &self.formats {
            if !seen_formats.insert(*format) {
                return Err(Error::Config(format!("format {format} is listed twice")));
            }
        }

        let mut seen_names = HashSet::new();
        for path in &self.databases {
            let name = database_name(path)?;
            if !seen_names.insert(name.clone()) {
                return Err(Error::Config(format!(
                    "database names must be unique: {name:?} is used by more than one path"
                )));
            }
        }

        if self.limits.max_io_ms == 0 {
            return Err(Error::Config("limits.max_io_ms must be > 0".to_string()));
        }
        if self.limits.max_concurrency_io == 0 {
            return Err(Error::Config(
                "limits.max_concurrency_io must be > 0".to_string(),
            ));
        }
        if self.limits.max_concurrency_io > 1024 {
            return Err(Error::Config(
                "limits.max_concurrency_io is too large (max 1024)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Name under which a database file appears below the root: its basename.
pub fn database_name(path: &Path) -> Result<String> {
    let Some(name) = path.file_name() else {
        return Err(Error::Config(format!(
            "database path has no file name: {}",
            path.display()
        )));
    };
    let Some(name) = name.to_str() else {
        return Err(Error::Config(format!(
            "database file name is not valid UTF-8: {}",
            path.display()
        )));
    };
    if !crate::path::is_addressable_segment(name) {
        return Err(Error::Config(format!(
            "database file name cannot be used as a path segment: {name:?}"
        )));
    }
    Ok(name.to_string())
}

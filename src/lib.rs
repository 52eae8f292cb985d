#![forbid(unsafe_code)]

//! `dbfs` serves SQLite databases as a read-only tree of virtual files.
//!
//! - `provider`: configuration-backed entry point resolving paths
//! - `tree`: root, database and host-path collections, table artifacts
//! - `cancel`: cross-thread interruption of a request's SQLite work
//! - `table`: per-operation SQLite access (catalog listing, `SELECT *`)
//! - `encode`: CSV/TSV/JSON/JSON-lines row encoders

pub mod cancel;
pub mod encode;
pub mod provider;
pub mod table;
pub mod tree;

pub use cancel::CancelToken;
pub use dbfs_core::{Error, Result};
pub use provider::Provider;
pub use tree::{Collection, Resource, TableArtifact};

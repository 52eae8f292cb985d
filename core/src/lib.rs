mod error;

pub mod config;
pub mod format;
pub mod path;

pub use error::{Error, Result};

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::InvalidPath(_) => "invalid_path",
            Error::NotFound(_) => "not_found",
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::Query(_) => "query_failure",
            Error::Encoding(_) => "encoding",
            Error::Io(_) => "io",
            Error::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

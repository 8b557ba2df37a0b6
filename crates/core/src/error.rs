use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Parsing error: {0}")]
    Parsing(String),
    #[error("Unsafe path {}: {reason}", path.display())]
    UnsafePath { path: PathBuf, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("Request limiter: {0}")]
    Limiter(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<solscope_api::ApiError> for SolscopeError {
    fn from(err: solscope_api::ApiError) -> Self {
        match err {
            solscope_api::ApiError::NotFound(what) => SolscopeError::NotFound(what),
            other => SolscopeError::Internal(other.to_string()),
        }
    }
}

impl From<SolscopeError> for solscope_api::ApiError {
    fn from(err: SolscopeError) -> Self {
        match err {
            SolscopeError::NotFound(what) => solscope_api::ApiError::NotFound(what),
            SolscopeError::UnsafePath { .. } => {
                solscope_api::ApiError::InvalidArgument(err.to_string())
            }
            other => solscope_api::ApiError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SolscopeError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
}

impl TallyError {
    /// Whether this error came from the upstream log source
    pub fn is_upstream(&self) -> bool {
        matches!(self, TallyError::UpstreamFetch(_))
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;

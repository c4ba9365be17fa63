use thiserror::Error;

/// Failures while loading configuration or preparing the runtime directory.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Home directory not found: {0}")]
    Path(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed URL in configuration: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

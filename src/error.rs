use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid date range {input:?}: {reason}")]
    InvalidDate { input: String, reason: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
    #[error("cannot decode code point {0:?}")]
    Decode(String),
    #[error("upload error: {0}")]
    Upload(String),
    #[error("{0}")]
    Usage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SlackError>;

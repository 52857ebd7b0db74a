use std::time::Duration;

use thiserror::Error;

use crate::api::Status;
use crate::domain::OrchestratorState;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("failed to initialize log directory {path}: {source}")]
    LogDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to launch cluster: {0}")]
    Launch(String),

    #[error("cluster did not become healthy within {0:?}")]
    HealthTimeout(Duration),

    #[error("aborted")]
    Aborted,

    #[error("node not found: {name}")]
    NotFound { name: String },

    #[error("cluster already exists")]
    AlreadyExists,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("cluster is not ready (state: {state})")]
    NotReady { state: OrchestratorState },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("shutdown failed: {0}")]
    Shutdown(String),

    #[error("{0}")]
    Remote(Status),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Remote(status)
    }
}

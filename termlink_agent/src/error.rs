use serde_json::Value;
use thiserror::Error;

/// Failure below the HTTP status line: the request never produced a usable response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("malformed response: {0}")]
    Response(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The request could not be built from its parts.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_body() {
            TransportError::Response(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("register request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("{0} exist already")]
    NameExists(String),
    #[error("unknown: {name} (status {status}, body {body})")]
    Unknown {
        name: String,
        status: u16,
        body: Value,
    },
    #[error("register response missing {0}")]
    Malformed(&'static str),
    #[error("terminal is already registered")]
    AlreadyRegistered,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected status {status} (want {expected})")]
    UnexpectedStatus { status: u16, expected: u16 },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("terminal is not registered")]
    Unregistered,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

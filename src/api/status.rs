//! Error envelope carried on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Canonical status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Aborted,
    Internal,
    Unavailable,
}

impl Code {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Canceled => "Canceled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::Aborted => "Aborted",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(Code::Canceled, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error: code = {} desc = {}", self.code, self.message)
    }
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::Config(_) | Error::InvalidArgument(_) => Code::InvalidArgument,
            Error::Launch(_) => Code::Internal,
            Error::HealthTimeout(_) => Code::DeadlineExceeded,
            Error::Aborted => Code::Aborted,
            Error::NotFound { .. } => Code::NotFound,
            Error::AlreadyExists => Code::AlreadyExists,
            Error::Unavailable(_) => Code::Unavailable,
            Error::NotReady { .. } => Code::FailedPrecondition,
            Error::Remote(status) => return status.clone(),
            _ => Code::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

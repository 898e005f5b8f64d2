use std::fmt;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failed call against the Drive REST API.
///
/// `status` is absent when the request never produced a response
/// (connection refused, DNS failure, body could not be decoded, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(s) => write!(f, "GoogleAPIError {} {}", s, self.message),
            None => write!(f, "GoogleAPIError {}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.status().map(|s| s.as_u16()), e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("authorization denied: {0}")]
    AuthDenied(String),

    #[error("authorization provider error: {0}")]
    AuthProvider(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("folder lookup failed: {0}")]
    FolderLookup(#[source] ApiError),

    #[error("folder creation failed: {0}")]
    FolderCreate(#[source] ApiError),

    #[error("folder name `{name}` matches {count} folders")]
    AmbiguousFolder { name: String, count: usize },

    #[error("upload not allowed: {0}")]
    UploadPrecondition(&'static str),

    #[error("upload failed: {0}")]
    UploadRequest(#[source] ApiError),

    #[error("not authorized")]
    NotAuthorized,

    #[error("cannot {op} while {state}")]
    InvalidState { op: &'static str, state: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

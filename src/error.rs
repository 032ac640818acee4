use crate::http::Method;
use std::io;
use thiserror::Error;

/// Errors raised while registering or resolving routes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// A `*name` segment was followed by more segments.
    #[error("catch-all segment {segment:?} must be the last segment of {pattern:?}")]
    CatchAllNotLast { pattern: String, segment: String },

    /// A `:` or `*` segment without a name.
    #[error("wildcard segment {segment:?} in {pattern:?} has no name")]
    EmptyWildcardName { pattern: String, segment: String },

    /// No registered pattern matches the request.
    #[error("no route for {method} {path}")]
    NotFound { method: Method, path: String },
}

/// Errors raised by the hosting layer around the handler chain.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Panic: {0}")]
    Panic(String),
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::BadRequest(_) => 400,
            ServerError::PayloadTooLarge(_) => 413,
            ServerError::Io(_) | ServerError::Panic(_) => 500,
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

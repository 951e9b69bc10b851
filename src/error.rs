//! Error taxonomy shared by handlers, middleware and the dispatcher.
//!
//! # Design Decisions
//! - One request-time error type (`Error`) that always knows its status code
//! - Registration problems (`RouteError`) surface from `RouterBuilder::build`,
//!   never at request time
//! - Server-side causes are logged, never echoed to clients

use http::StatusCode;

/// Boxed error used for bodies and opaque handler failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error produced while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An explicit HTTP status with a client-facing message.
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Opaque failure inside a handler or middleware.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// A handler or middleware panicked.
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl Error {
    /// Build an error carrying an explicit status.
    pub fn status_with(status: StatusCode, message: impl Into<String>) -> Self {
        Error::Status {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::status_with(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Status code that will be sent for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Status { status, .. } => *status,
            Error::Handler(_) | Error::Panic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show to the client.
    ///
    /// Server errors collapse to the canonical reason phrase.
    pub fn public_message(&self) -> String {
        let status = self.status();
        match self {
            Error::Status { message, .. } if !status.is_server_error() => message.clone(),
            _ => status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
        }
    }
}

impl From<BoxError> for Error {
    fn from(err: BoxError) -> Self {
        Error::Handler(err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::Handler(Box::new(err))
    }
}

/// Error raised while registering routes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Two patterns would match exactly the same paths.
    #[error("route `{pattern}` conflicts with existing route `{existing}`")]
    Conflict { pattern: String, existing: String },

    #[error("handler for {method} `{pattern}` is already registered")]
    Duplicate { method: String, pattern: String },
}

impl RouteError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_constructors() {
        assert_eq!(Error::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::too_many_requests("x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(Error::Panic("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn server_errors_hide_details() {
        let err = Error::internal("db password is hunter2");
        assert_eq!(err.public_message(), "Internal Server Error");

        let err: Error = BoxError::from("socket closed").into();
        assert_eq!(err.public_message(), "Internal Server Error");

        let err = Error::forbidden("not your repo");
        assert_eq!(err.public_message(), "not your repo");
    }
}

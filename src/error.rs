//! Error taxonomy and JSON error responses for the management API

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the dashboard core
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced app, container, or file does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// App code directory already exists (generated-name collision)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The container runtime cannot be reached
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Malformed request from the management surface
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Filesystem failure in the code store
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other container runtime failure
    #[error("container runtime error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Response serialization failure
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status code the management API responds with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::RuntimeUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Io(_) | Error::Docker(_) | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for the X-Dashboard-Error header
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::RuntimeUnavailable(_) => "RUNTIME_UNAVAILABLE",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::Io(_) => "STORE_IO",
            Error::Docker(_) => "RUNTIME_ERROR",
            Error::Json(_) => "SERIALIZATION",
        }
    }
}

/// Build a JSON error response with the X-Dashboard-Error header set
pub fn json_error_response(error: &Error) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "success": false,
        "error": error.to_string(),
        "code": error.code(),
    })
    .to_string();

    Response::builder()
        .status(error.status_code())
        .header("Content-Type", "application/json")
        .header("X-Dashboard-Error", error.code())
        .body(Full::new(Bytes::from(body)))
        .expect("valid response with StatusCode enum and static headers")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::AlreadyExists("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::RuntimeUnavailable("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(Error::AlreadyExists("x".into()).code(), "ALREADY_EXISTS");
        assert_eq!(
            Error::RuntimeUnavailable("x".into()).code(),
            "RUNTIME_UNAVAILABLE"
        );
    }

    #[test]
    fn test_json_error_response() {
        let response = json_error_response(&Error::NotFound("app bright-sea-123".into()));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/json"
        );
        assert_eq!(
            response.headers().get("X-Dashboard-Error").unwrap(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn test_io_not_found_maps_to_internal() {
        // Store-level io::ErrorKind::NotFound is normalized to Error::NotFound
        // before it reaches the API; a raw Io variant stays a 500.
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

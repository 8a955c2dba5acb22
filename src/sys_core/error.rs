//! Handler-boundary errors and their JSON rendering.

use hyper::header::{HeaderValue, RETRY_AFTER};
use hyper::{Body, Response, StatusCode};
use thiserror::Error;

use crate::sys_core::response::json_response;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Rate limit exceeded: {quota}")]
    RateLimited { quota: String, retry_after_secs: u64 },
    /// Carries the underlying error text straight to the client.
    #[error("{0}")]
    Internal(String),
}

#[derive(serde::Serialize)]
struct Detail<'a> {
    detail: &'a str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> Response<Body> {
        let message = self.to_string();
        let mut resp = json_response(self.status(), &Detail { detail: &message });
        if let ApiError::RateLimited { retry_after_secs, .. } = self {
            resp.headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        resp
    }
}

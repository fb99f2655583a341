//! Response handling.
//!
//! # Responsibilities
//! - Map routing errors to appropriate HTTP status codes
//!
//! # Design Decisions
//! - Empty registry is a gateway failure (502), nothing is forwarded
//! - Upstream responses are streamed back unmodified

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::load_balancer::error::LoadBalancerError;

impl LoadBalancerError {
    /// Status code reported to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            LoadBalancerError::NoBackendsAvailable | LoadBalancerError::UpstreamUri { .. } => {
                StatusCode::BAD_GATEWAY
            }
            LoadBalancerError::InvalidRange(_)
            | LoadBalancerError::MalformedBackendIdentifier { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for LoadBalancerError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

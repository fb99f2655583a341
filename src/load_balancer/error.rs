//! Load balancer error types.

use thiserror::Error;

/// A random source was asked for a value from an empty or inverted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid random range [{minimum}, {maximum})")]
pub struct InvalidRange {
    pub minimum: usize,
    pub maximum: usize,
}

/// Errors that can occur while selecting or dispatching to a backend.
#[derive(Debug, Error)]
pub enum LoadBalancerError {
    /// The registry was empty at selection time.
    #[error("no backend server available to fulfill this request")]
    NoBackendsAvailable,

    /// The configured random source rejected the requested range.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),

    /// A backend address could not be parsed into an identity.
    #[error("malformed backend identifier '{address}': {reason}")]
    MalformedBackendIdentifier { address: String, reason: String },

    /// The chosen backend and the inbound URI do not form a valid upstream URI.
    #[error("cannot build upstream URI for {backend}: {reason}")]
    UpstreamUri { backend: String, reason: String },
}

impl LoadBalancerError {
    pub(crate) fn malformed(address: &str, reason: impl ToString) -> Self {
        Self::MalformedBackendIdentifier {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for load balancer operations.
pub type LoadBalancerResult<T> = Result<T, LoadBalancerError>;

//! Backend identity.
//!
//! # Responsibilities
//! - Parse and normalize an endpoint address into a comparable value
//! - Key the registry by value, never by allocation
//! - Rewrite inbound request URIs to target the backend

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::Uri;
use url::Url;

use crate::load_balancer::error::{LoadBalancerError, LoadBalancerResult};

/// Normalized identity of one upstream target.
///
/// Equality and hashing follow the normalized URL text, so `http://A:80`
/// and `http://a/` are the same backend.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId {
    url: Arc<Url>,
}

impl BackendId {
    /// Parse an endpoint address. A missing scheme defaults to `http`.
    /// Only plain `http` is accepted: the forwarder does not originate TLS.
    pub fn parse(address: &str) -> LoadBalancerResult<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(LoadBalancerError::malformed(address, "empty address"));
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let mut url = Url::parse(&candidate).map_err(|e| LoadBalancerError::malformed(address, e))?;
        match url.scheme() {
            "http" => {}
            "https" => {
                return Err(LoadBalancerError::malformed(
                    address,
                    "https backends are not supported; terminate TLS in front of the backend",
                ))
            }
            other => {
                return Err(LoadBalancerError::malformed(
                    address,
                    format!("unsupported scheme '{}'", other),
                ))
            }
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(LoadBalancerError::malformed(address, "missing host"));
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { url: Arc::new(url) })
    }

    /// The normalized address text.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Host name or address literal (IPv6 in brackets).
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// `host[:port]`, with the port omitted when it is the scheme default.
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }

    /// Build the upstream URI for an inbound request URI.
    ///
    /// Scheme and authority come from the backend; the backend's base path is
    /// prefixed to the inbound path and the inbound query is kept.
    pub fn target_uri(&self, inbound: &Uri) -> LoadBalancerResult<Uri> {
        let path_and_query = inbound.path_and_query().map_or("/", |pq| pq.as_str());
        let base_path = self.url.path().trim_end_matches('/');
        let joined = if path_and_query.starts_with('/') {
            format!("{}{}", base_path, path_and_query)
        } else {
            format!("{}/{}", base_path, path_and_query)
        };

        Uri::builder()
            .scheme(self.url.scheme())
            .authority(self.authority().as_str())
            .path_and_query(joined.as_str())
            .build()
            .map_err(|e| LoadBalancerError::UpstreamUri {
                backend: self.to_string(),
                reason: e.to_string(),
            })
    }
}

impl FromStr for BackendId {
    type Err = LoadBalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BackendId").field(&self.as_str()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_by_value() {
        let a1 = BackendId::parse("http://a").unwrap();
        let a2 = BackendId::parse("HTTP://A:80/").unwrap();
        assert_eq!(a1, a2);
        assert_eq!(a1.as_str(), "http://a/");

        let mut set = std::collections::HashSet::new();
        set.insert(a1);
        assert!(set.contains(&a2));
    }

    #[test]
    fn test_scheme_defaults_to_http() {
        let b = BackendId::parse("127.0.0.1:3000").unwrap();
        assert_eq!(b.as_str(), "http://127.0.0.1:3000/");
        assert_eq!(b.authority(), "127.0.0.1:3000");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "   ", "ftp://files", "http://", "http://exa mple.com", "http://a:99999"] {
            let err = BackendId::parse(bad).unwrap_err();
            assert!(
                matches!(err, LoadBalancerError::MalformedBackendIdentifier { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_https() {
        let err = BackendId::parse("https://127.0.0.1:8443").unwrap_err();
        assert!(err.to_string().contains("https backends are not supported"));
    }

    #[test]
    fn test_target_uri() {
        let b = BackendId::parse("http://testa:8080").unwrap();
        let inbound: Uri = "/asdf?x=1".parse().unwrap();
        assert_eq!(b.target_uri(&inbound).unwrap().to_string(), "http://testa:8080/asdf?x=1");

        let prefixed = BackendId::parse("http://api.example.com/v1/").unwrap();
        let inbound: Uri = "/users".parse().unwrap();
        assert_eq!(
            prefixed.target_uri(&inbound).unwrap().to_string(),
            "http://api.example.com/v1/users"
        );
    }

    #[test]
    fn test_ipv6_authority() {
        let b = BackendId::parse("http://[::1]:9000").unwrap();
        assert_eq!(b.authority(), "[::1]:9000");
        let uri = b.target_uri(&Uri::from_static("/")).unwrap();
        assert_eq!(uri.authority().unwrap().as_str(), "[::1]:9000");
    }
}

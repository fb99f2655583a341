//! Backend selection core for HTTP request routing.
//!
//! Power-of-k-choices, join-shortest-queue and uniform random selection over
//! one lock-protected registry of outstanding-request counters.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Balancer, BackendId, Forwarder, LoadBalancer};

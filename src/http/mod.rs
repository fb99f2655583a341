//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, handler)
//!     → request.rs (request ID assigned and propagated)
//!     → Balancer::route (select, account, rewrite)
//!     → forward.rs (hyper client performs the upstream exchange)
//!     → response.rs (routing errors mapped to status codes)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::HyperForwarder;
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;

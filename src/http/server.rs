//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the routing handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Hand every request to the balancer
//! - Apply reloaded backend lists to the running balancer

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{BalancerConfig, ProxyConfig};
use crate::http::forward::HyperForwarder;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::error::LoadBalancerResult;
use crate::load_balancer::Balancer;
use crate::observability::metrics;

/// HTTP server fronting one balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    balancer: Arc<Balancer>,
}

impl HttpServer {
    /// Create a server whose balancer forwards through a [`HyperForwarder`].
    pub fn new(config: ProxyConfig) -> LoadBalancerResult<Self> {
        let forwarder = Arc::new(HyperForwarder::new(&config.timeouts));
        let balancer = Balancer::from_config(&config.balancer)?.with_forwarder(forwarder);
        Ok(Self::with_balancer(config, Arc::new(balancer)))
    }

    /// Create a server around an existing balancer.
    pub fn with_balancer(config: ProxyConfig, balancer: Arc<Balancer>) -> Self {
        let router = Self::build_router(&config, balancer.clone());
        Self {
            router,
            config,
            balancer,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, balancer: Arc<Balancer>) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(balancer)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// A clone of the router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn balancer(&self) -> Arc<Balancer> {
        self.balancer.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires. Configs received on `updates`
    /// replace the balancer's backend list.
    pub async fn run(
        self,
        listener: TcpListener,
        mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strategy = self.balancer.strategy_name(),
            backends = self.balancer.backend_count(),
            "HTTP server starting"
        );
        if self.balancer.backend_count() == 0 {
            tracing::warn!("No backends configured; every request will get 502");
        }

        let balancer = self.balancer.clone();
        let initial = self.config.balancer.clone();
        let reload = tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                if strategy_settings_changed(&initial, &config.balancer) {
                    tracing::warn!("Strategy settings changed; only the backend list is reloaded");
                }
                match balancer.sync_backends(&config.balancer.backends) {
                    Ok((added, removed)) => {
                        tracing::info!(added, removed, total = balancer.backend_count(), "Config reloaded")
                    }
                    Err(e) => tracing::error!(error = %e, "Rejected reloaded backend list"),
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reload.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Whether anything besides the backend list differs. Those settings are
/// fixed for the balancer's lifetime.
fn strategy_settings_changed(current: &BalancerConfig, reloaded: &BalancerConfig) -> bool {
    current.strategy != reloaded.strategy
        || current.choices != reloaded.choices
        || current.candidate_window != reloaded.candidate_window
        || current.diagnostics != reloaded.diagnostics
        || current.seed != reloaded.seed
}

/// Routes every request through the balancer.
async fn proxy_handler(State(balancer): State<Arc<Balancer>>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        "Routing request"
    );

    let response = match balancer.route(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Routing failed");
            e.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

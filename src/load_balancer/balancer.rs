//! Routing facade.
//!
//! # Responsibilities
//! - Own the registry and random source behind one lock
//! - Run the configured strategy for each request
//! - Account outstanding requests around the upstream exchange
//! - Expose diagnostic accessors
//!
//! # Locking
//! Selection, acquire, release and add/remove are separate short critical
//! sections. The lock is never held while the forwarder runs, so two racing
//! selections may pick the same backend before either records its increment.
//!
//! A forwarded request stays outstanding until its response body has been
//! fully streamed or dropped.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use axum::body::{Body, BodyDataStream, Bytes};
use axum::http::{header, Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::stream::{Stream, StreamExt};

use crate::config::BalancerConfig;
use crate::config::schema::StrategyKind;
use crate::load_balancer::backend::BackendId;
use crate::load_balancer::error::LoadBalancerResult;
use crate::load_balancer::least_conn::LeastConnections;
use crate::load_balancer::power_of_choices::PowerOfChoices;
use crate::load_balancer::random::{RandomSource, SystemRandom};
use crate::load_balancer::registry::Registry;
use crate::load_balancer::uniform::UniformRandom;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;

/// Performs the upstream exchange for a request already rewritten to
/// target the chosen backend.
pub trait Forwarder: Send + Sync {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Response<Body>>;
}

struct Inner {
    registry: Registry,
    random: Box<dyn RandomSource>,
}

/// Per-request entry point tying selection, accounting and dispatch together.
pub struct Balancer {
    inner: Arc<Mutex<Inner>>,
    strategy: Box<dyn LoadBalancer>,
    forwarder: Option<Arc<dyn Forwarder>>,
}

impl Balancer {
    /// Build a balancer over `backends` with the given strategy.
    /// Uses [`SystemRandom`] and no forwarder until configured otherwise.
    pub fn new<I, S>(
        backends: I,
        strategy: Box<dyn LoadBalancer>,
        diagnostics: bool,
    ) -> LoadBalancerResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Registry::new(diagnostics);
        for address in backends {
            registry.add(BackendId::parse(address.as_ref())?);
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                registry,
                random: Box::new(SystemRandom::new()),
            })),
            strategy,
            forwarder: None,
        })
    }

    /// Build a balancer from configuration. Fails on the first malformed backend.
    pub fn from_config(config: &BalancerConfig) -> LoadBalancerResult<Self> {
        let strategy: Box<dyn LoadBalancer> = match config.strategy {
            StrategyKind::PowerOfChoices => Box::new(
                PowerOfChoices::new(config.choices).with_window(config.candidate_window),
            ),
            StrategyKind::JoinShortestQueue => Box::new(LeastConnections::new()),
            StrategyKind::Random => Box::new(UniformRandom::new()),
        };

        let mut balancer = Self::new(&config.backends, strategy, config.diagnostics)?;
        if let Some(seed) = config.seed {
            balancer = balancer.with_random_source(SystemRandom::seeded(seed));
        }
        Ok(balancer)
    }

    /// Replace the random source.
    pub fn with_random_source(self, random: impl RandomSource + 'static) -> Self {
        self.lock().random = Box::new(random);
        self
    }

    /// Set the collaborator that performs upstream exchanges.
    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Run the strategy under the lock.
    pub fn next_server(&self) -> LoadBalancerResult<BackendId> {
        let mut inner = self.lock();
        let Inner { registry, random } = &mut *inner;
        let selected = self.strategy.next_server(registry, random.as_mut());
        drop(inner);

        match &selected {
            Ok(backend) => metrics::record_selection(self.strategy.name(), backend),
            Err(_) => metrics::record_no_backends(self.strategy.name()),
        }
        selected
    }

    /// Count a request against `backend` until the guard drops.
    pub fn acquire(&self, backend: BackendId) -> OutstandingGuard {
        let outstanding = self.lock().registry.acquire(&backend);
        if let Some(n) = outstanding {
            metrics::set_outstanding(&backend, n);
        }
        OutstandingGuard {
            inner: self.inner.clone(),
            backend,
        }
    }

    /// Route one request: select, account, forward, release.
    ///
    /// The returned body carries the outstanding slot and releases it at end
    /// of stream or on drop. Without a forwarder the request is counted but
    /// not dispatched, and a diagnostic message is returned instead.
    pub async fn route(&self, request: Request<Body>) -> LoadBalancerResult<Response<Body>> {
        let backend = self.next_server()?;
        let guard = self.acquire(backend);

        let Some(forwarder) = self.forwarder.as_ref() else {
            tracing::warn!(
                strategy = self.strategy.name(),
                backend = %guard.backend(),
                "No forwarder configured; request not dispatched"
            );
            return Ok(dry_run_response(self.strategy.name(), guard.backend()));
        };

        let (mut parts, body) = request.into_parts();
        parts.uri = guard.backend().target_uri(&parts.uri)?;
        parts.headers.remove(header::HOST);

        tracing::debug!(backend = %guard.backend(), uri = %parts.uri, "Forwarding request");
        let (parts, body) = forwarder
            .forward(Request::from_parts(parts, body))
            .await
            .into_parts();
        Ok(Response::from_parts(parts, guard.hold_until_end(body)))
    }

    /// Add a backend by address. Returns `true` when it was not yet registered.
    pub fn add(&self, address: &str) -> LoadBalancerResult<bool> {
        let backend = BackendId::parse(address)?;
        let added = self.lock().registry.add(backend.clone());
        if added {
            tracing::info!(backend = %backend, "Backend added");
        }
        Ok(added)
    }

    /// Remove a backend by address. Returns `true` when it was registered.
    pub fn remove(&self, address: &str) -> LoadBalancerResult<bool> {
        let backend = BackendId::parse(address)?;
        let removed = self.lock().registry.remove(&backend);
        if removed {
            tracing::info!(backend = %backend, "Backend removed");
        }
        Ok(removed)
    }

    /// Make the registry match `addresses`. Every address is parsed before
    /// anything changes. Returns `(added, removed)`.
    pub fn sync_backends<S: AsRef<str>>(&self, addresses: &[S]) -> LoadBalancerResult<(usize, usize)> {
        let wanted = addresses
            .iter()
            .map(|a| BackendId::parse(a.as_ref()))
            .collect::<LoadBalancerResult<Vec<_>>>()?;

        let mut inner = self.lock();
        let stale: Vec<BackendId> = inner
            .registry
            .snapshot_keys()
            .into_iter()
            .filter(|k| !wanted.contains(k))
            .collect();
        for backend in &stale {
            inner.registry.remove(backend);
        }
        let added = wanted
            .into_iter()
            .filter(|backend| inner.registry.add(backend.clone()))
            .count();
        drop(inner);

        if added > 0 || !stale.is_empty() {
            tracing::info!(added, removed = stale.len(), "Backends reconciled");
        }
        Ok((added, stale.len()))
    }

    // --- Diagnostics ---

    pub fn backend_count(&self) -> usize {
        self.lock().registry.len()
    }

    pub fn backends(&self) -> Vec<BackendId> {
        self.lock().registry.snapshot_keys()
    }

    pub fn outstanding(&self, backend: &BackendId) -> Option<usize> {
        self.lock().registry.outstanding(backend)
    }

    pub fn high_watermark(&self, backend: &BackendId) -> Option<usize> {
        self.lock().registry.high_watermark(backend)
    }

    pub fn lifetime_count(&self, backend: &BackendId) -> Option<u64> {
        self.lock().registry.lifetime_count(backend)
    }

    /// Requests currently in flight through this balancer.
    pub fn in_flight(&self) -> usize {
        self.lock().registry.in_flight()
    }

    /// Sample size `k` of the strategy, with 0 already replaced by the
    /// default. `None` for strategies that do not sample.
    pub fn configured_choices(&self) -> Option<usize> {
        self.strategy.configured_choices()
    }

    pub fn random_source_kind(&self) -> &'static str {
        self.lock().random.kind()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn has_forwarder(&self) -> bool {
        self.forwarder.is_some()
    }
}

impl fmt::Debug for Balancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Balancer")
            .field("strategy", &self.strategy)
            .field("choices", &self.strategy.configured_choices())
            .field("has_forwarder", &self.forwarder.is_some())
            .finish_non_exhaustive()
    }
}

fn dry_run_response(strategy: &str, backend: &BackendId) -> Response<Body> {
    let mut response = Response::new(Body::from(format!(
        "{} does not have a forwarder and is unable to forward to {}.",
        strategy, backend
    )));
    *response.status_mut() = StatusCode::OK;
    response
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // Counters stay consistent even if a holder panicked mid-section.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A RAII guard that releases the backend's outstanding count on drop,
/// whether the exchange succeeded, failed or was cancelled.
pub struct OutstandingGuard {
    inner: Arc<Mutex<Inner>>,
    backend: BackendId,
}

impl OutstandingGuard {
    pub fn backend(&self) -> &BackendId {
        &self.backend
    }

    /// Move the guard into `body`, so the slot stays taken while the
    /// response streams.
    pub fn hold_until_end(self, body: Body) -> Body {
        Body::from_stream(GuardedStream {
            inner: body.into_data_stream(),
            guard: Some(self),
        })
    }
}

impl fmt::Debug for OutstandingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutstandingGuard")
            .field("backend", &self.backend)
            .finish()
    }
}

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        let outstanding = lock(&self.inner).registry.release(&self.backend);
        if let Some(n) = outstanding {
            metrics::set_outstanding(&self.backend, n);
        }
    }
}

/// Response body stream that releases its guard on the last chunk or error.
struct GuardedStream {
    inner: BodyDataStream,
    guard: Option<OutstandingGuard>,
}

impl Stream for GuardedStream {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.poll_next_unpin(cx);
        if matches!(polled, Poll::Ready(None | Some(Err(_)))) {
            self.guard.take();
        }
        polled
    }
}

//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → balancer.rs (facade, owns registry + random source under one lock)
//!     → Apply selection strategy over a registry snapshot:
//!         - power_of_choices.rs (sample k, pick least outstanding)
//!         - least_conn.rs (join shortest queue over all backends)
//!         - uniform.rs (one uniform draw, baseline)
//!     → registry.rs (acquire; guard releases on every exit path)
//!     → Forwarder performs the upstream exchange, lock not held
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; the registry holds all counters
//! - Backends are keyed by normalized value, never by allocation
//! - Randomness is injected so every strategy is testable without entropy
//! - A single backend is returned without consulting randomness

pub mod backend;
pub mod balancer;
pub mod error;
pub mod least_conn;
pub mod power_of_choices;
pub mod random;
pub mod registry;
pub mod uniform;

use std::fmt;

use crate::load_balancer::error::{LoadBalancerError, LoadBalancerResult};
use crate::load_balancer::random::RandomSource;
use crate::load_balancer::registry::Registry;

pub use backend::BackendId;
pub use balancer::{Balancer, Forwarder, OutstandingGuard};
pub use least_conn::LeastConnections;
pub use power_of_choices::{CandidateWindow, PowerOfChoices};
pub use random::{ScriptedRandom, SystemRandom};
pub use uniform::UniformRandom;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Strategy name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Sample size `k`, for strategies that sample.
    fn configured_choices(&self) -> Option<usize> {
        None
    }

    /// Choose among at least two candidates, given in registry order.
    fn pick(
        &self,
        candidates: Vec<BackendId>,
        registry: &Registry,
        random: &mut dyn RandomSource,
    ) -> LoadBalancerResult<BackendId>;

    /// Select the next backend. Handles the empty and single-member
    /// registry before delegating to [`pick`](Self::pick).
    fn next_server(
        &self,
        registry: &Registry,
        random: &mut dyn RandomSource,
    ) -> LoadBalancerResult<BackendId> {
        let keys = registry.snapshot_keys();
        match keys.as_slice() {
            [] => Err(LoadBalancerError::NoBackendsAvailable),
            [only] => Ok(only.clone()),
            _ => self.pick(keys, registry, random),
        }
    }
}

/// First backend with the fewest outstanding requests, scanning left to right.
pub(crate) fn least_outstanding(candidates: &[BackendId], registry: &Registry) -> Option<BackendId> {
    // min_by_key keeps the first of equal minima
    candidates
        .iter()
        .min_by_key(|id| registry.outstanding(id).unwrap_or(0))
        .cloned()
}

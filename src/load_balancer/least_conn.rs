//! Least Connections (join-shortest-queue) load balancing strategy.

use crate::load_balancer::backend::BackendId;
use crate::load_balancer::error::{LoadBalancerError, LoadBalancerResult};
use crate::load_balancer::random::RandomSource;
use crate::load_balancer::registry::Registry;
use crate::load_balancer::{least_outstanding, LoadBalancer};

/// Least connections selector.
/// Selects the backend with the minimum number of outstanding requests.
/// Never consumes randomness.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for LeastConnections {
    fn name(&self) -> &'static str {
        "join_shortest_queue"
    }

    fn pick(
        &self,
        candidates: Vec<BackendId>,
        registry: &Registry,
        _random: &mut dyn RandomSource,
    ) -> LoadBalancerResult<BackendId> {
        // In case of tie, the first one in insertion order is selected
        least_outstanding(&candidates, registry).ok_or(LoadBalancerError::NoBackendsAvailable)
    }
}

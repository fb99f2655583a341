//! Uniform random load balancing strategy.
//!
//! Baseline for comparison: outstanding counts are not consulted.

use crate::load_balancer::backend::BackendId;
use crate::load_balancer::error::LoadBalancerResult;
use crate::load_balancer::random::RandomSource;
use crate::load_balancer::registry::Registry;
use crate::load_balancer::LoadBalancer;

#[derive(Debug, Default)]
pub struct UniformRandom;

impl UniformRandom {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for UniformRandom {
    fn name(&self) -> &'static str {
        "random"
    }

    fn pick(
        &self,
        mut candidates: Vec<BackendId>,
        _registry: &Registry,
        random: &mut dyn RandomSource,
    ) -> LoadBalancerResult<BackendId> {
        let index = random.next_int(0, candidates.len())?;
        Ok(candidates.swap_remove(index))
    }
}

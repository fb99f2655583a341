//! Power-of-k-choices load balancing strategy.
//!
//! Samples `k` backends uniformly at random and routes to the one with the
//! fewest outstanding requests. Sampling keeps the decision O(k) while still
//! bounding worst-case imbalance.
//!
//! # Algorithm
//! 1. Normalize `k`: 0 becomes [`DEFAULT_CHOICES`], anything above the
//!    registry size `N` is clamped to `N`.
//! 2. `k == N`: scan every backend (join-shortest-queue), no randomness.
//! 3. Otherwise shuffle a snapshot of the keys (Fisher–Yates, `j` drawn
//!    from `[0, i]`) and take the first `k` as candidates.
//! 4. Pick the candidate with the fewest outstanding requests; ties go to
//!    the earliest shuffled position.

use serde::{Deserialize, Serialize};

use crate::load_balancer::backend::BackendId;
use crate::load_balancer::error::{LoadBalancerError, LoadBalancerResult};
use crate::load_balancer::random::RandomSource;
use crate::load_balancer::registry::Registry;
use crate::load_balancer::{least_outstanding, LoadBalancer};

/// Sample size used when none is configured.
pub const DEFAULT_CHOICES: usize = 2;

/// How many shuffled entries are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateWindow {
    /// Exactly `k` candidates.
    #[default]
    Exact,
    /// `k + 1` candidates (capped at `N`), the legacy loop bound.
    Inclusive,
}

#[derive(Debug, Clone)]
pub struct PowerOfChoices {
    choices: usize,
    window: CandidateWindow,
}

impl PowerOfChoices {
    pub fn new(choices: usize) -> Self {
        Self {
            choices: if choices == 0 { DEFAULT_CHOICES } else { choices },
            window: CandidateWindow::default(),
        }
    }

    pub fn with_window(mut self, window: CandidateWindow) -> Self {
        self.window = window;
        self
    }

    /// Configured `k`, with 0 already replaced by the default.
    pub fn choices(&self) -> usize {
        self.choices
    }

    pub fn window(&self) -> CandidateWindow {
        self.window
    }

    /// `k` clamped to a registry of `backends` members.
    pub fn normalized_choices(&self, backends: usize) -> usize {
        self.choices.min(backends)
    }
}

impl Default for PowerOfChoices {
    fn default() -> Self {
        Self::new(DEFAULT_CHOICES)
    }
}

impl LoadBalancer for PowerOfChoices {
    fn name(&self) -> &'static str {
        "power_of_choices"
    }

    fn configured_choices(&self) -> Option<usize> {
        Some(self.choices)
    }

    fn pick(
        &self,
        mut candidates: Vec<BackendId>,
        registry: &Registry,
        random: &mut dyn RandomSource,
    ) -> LoadBalancerResult<BackendId> {
        let total = candidates.len();
        let k = self.normalized_choices(total);

        if k < total {
            for i in 0..total {
                let j = random.next_int(0, i + 1)?;
                candidates.swap(i, j);
            }
            let window = match self.window {
                CandidateWindow::Exact => k,
                CandidateWindow::Inclusive => (k + 1).min(total),
            };
            candidates.truncate(window);
        }

        least_outstanding(&candidates, registry).ok_or(LoadBalancerError::NoBackendsAvailable)
    }
}

//! Injectable randomness for selection strategies.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::error::InvalidRange;

/// Yields integers from a half-open range. May or may not actually be random.
pub trait RandomSource: Send + fmt::Debug {
    /// Return a value in `[minimum, maximum)`.
    fn next_int(&mut self, minimum: usize, maximum: usize) -> Result<usize, InvalidRange>;

    /// Short name of the variant, for diagnostics.
    fn kind(&self) -> &'static str;
}

fn check_range(minimum: usize, maximum: usize) -> Result<(), InvalidRange> {
    if maximum <= minimum {
        return Err(InvalidRange { minimum, maximum });
    }
    Ok(())
}

/// General-purpose PRNG. Not cryptographically secure; selection is a
/// load heuristic, not a security control.
pub struct SystemRandom {
    rng: StdRng,
}

impl SystemRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRandom").finish_non_exhaustive()
    }
}

impl RandomSource for SystemRandom {
    fn next_int(&mut self, minimum: usize, maximum: usize) -> Result<usize, InvalidRange> {
        check_range(minimum, maximum)?;
        Ok(self.rng.gen_range(minimum..maximum))
    }

    fn kind(&self) -> &'static str {
        "system"
    }
}

#[derive(Debug)]
struct Script {
    values: Vec<usize>,
    cursor: AtomicUsize,
    calls: AtomicUsize,
}

/// Replays a fixed sequence, wrapping to the start once exhausted.
///
/// Clones share the cursor and call count, so a test can keep one handle
/// and hand the other to a balancer.
///
/// A scripted value outside the requested range is reduced into it
/// (`minimum + value % span`); an empty script always yields `minimum`.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    script: Arc<Script>,
}

impl ScriptedRandom {
    pub fn new(values: Vec<usize>) -> Self {
        Self {
            script: Arc::new(Script {
                values,
                cursor: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of successful `next_int` calls so far.
    pub fn call_count(&self) -> usize {
        self.script.calls.load(Ordering::Relaxed)
    }
}

impl RandomSource for ScriptedRandom {
    fn next_int(&mut self, minimum: usize, maximum: usize) -> Result<usize, InvalidRange> {
        check_range(minimum, maximum)?;
        self.script.calls.fetch_add(1, Ordering::Relaxed);

        let values = &self.script.values;
        if values.is_empty() {
            return Ok(minimum);
        }
        let index = self.script.cursor.fetch_add(1, Ordering::Relaxed) % values.len();
        let value = values[index];
        if (minimum..maximum).contains(&value) {
            Ok(value)
        } else {
            Ok(minimum + value % (maximum - minimum))
        }
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_random_in_range() {
        let mut random = SystemRandom::new();
        for _ in 0..1000 {
            let n = random.next_int(3, 10).unwrap();
            assert!((3..10).contains(&n));
        }
        assert_eq!(random.kind(), "system");
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut r1 = SystemRandom::seeded(7);
        let mut r2 = SystemRandom::seeded(7);
        let a: Vec<_> = (0..20).map(|_| r1.next_int(0, 100).unwrap()).collect();
        let b: Vec<_> = (0..20).map(|_| r2.next_int(0, 100).unwrap()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_range() {
        let mut random = SystemRandom::new();
        assert_eq!(
            random.next_int(5, 2),
            Err(InvalidRange { minimum: 5, maximum: 2 })
        );
        assert!(random.next_int(4, 4).is_err());

        let mut scripted = ScriptedRandom::new(vec![0]);
        assert!(scripted.next_int(1, 0).is_err());
        assert_eq!(scripted.call_count(), 0);
    }

    #[test]
    fn test_scripted_cycles_and_counts() {
        let values = vec![1, 3, 5];
        let mut random = ScriptedRandom::new(values.clone());
        let observer = random.clone();
        for i in 0..100 {
            assert_eq!(random.next_int(0, 100).unwrap(), values[i % values.len()]);
        }
        assert_eq!(observer.call_count(), 100);
        assert_eq!(random.kind(), "scripted");
    }

    #[test]
    fn test_scripted_out_of_range_is_reduced() {
        let mut random = ScriptedRandom::new(vec![7]);
        assert_eq!(random.next_int(0, 3).unwrap(), 1);
        assert_eq!(random.next_int(10, 12).unwrap(), 11);

        let mut empty = ScriptedRandom::new(Vec::new());
        assert_eq!(empty.next_int(4, 9).unwrap(), 4);
    }
}

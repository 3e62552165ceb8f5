// ABOUTME: Random identifier allocation for listings and bookings.
// ABOUTME: Draws numeric ids from a bounded range and retries on collision, up to a fixed attempt limit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Upper bound of the identifier range.
pub const ID_MAX: u64 = 999_999_999;

/// Lower bound of the identifier range: the smallest nine-digit number.
pub const ID_MIN: u64 = ID_MAX / 10 + 1;

/// Draws per allocation before giving up. At the scale the marketplace
/// targets the table is nowhere near the id space, so hitting this means the
/// range is effectively full.
pub const MAX_ATTEMPTS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("no free identifier in [{min}, {max}] after {attempts} attempts")]
    IdSpaceExhausted { min: u64, max: u64, attempts: usize },
}

/// Allocates ids as stringified integers drawn from `[min, max]`.
#[derive(Debug)]
pub struct IdAllocator {
    rng: StdRng,
    min: u64,
    max: u64,
    max_attempts: usize,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Allocator over `[ID_MIN, ID_MAX]`, seeded from the OS. Every id in that
    /// range is exactly nine digits long.
    pub fn new() -> Self {
        Self::with_range(StdRng::from_entropy(), ID_MIN, ID_MAX)
    }

    /// Deterministic allocator over the default range.
    pub fn seeded(seed: u64) -> Self {
        Self::with_range(StdRng::seed_from_u64(seed), ID_MIN, ID_MAX)
    }

    pub fn with_range(rng: StdRng, min: u64, max: u64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            rng,
            min,
            max,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Return an id for which `is_taken` is false.
    pub fn allocate<F>(&mut self, is_taken: F) -> Result<String, IdError>
    where
        F: Fn(&str) -> bool,
    {
        for _ in 0..self.max_attempts {
            let candidate = self.rng.gen_range(self.min..=self.max).to_string();
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }

        tracing::error!(
            min = self.min,
            max = self.max,
            attempts = self.max_attempts,
            "identifier space exhausted"
        );
        Err(IdError::IdSpaceExhausted {
            min: self.min,
            max: self.max,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_fall_in_default_range() {
        let mut ids = IdAllocator::seeded(7);
        for _ in 0..100 {
            let id: u64 = ids.allocate(|_| false).unwrap().parse().unwrap();
            assert!((ID_MIN..=ID_MAX).contains(&id));
        }
    }

    #[test]
    fn default_ids_are_nine_digits() {
        assert_eq!(ID_MIN.to_string().len(), 9);
        assert_eq!(ID_MAX.to_string().len(), 9);

        let mut ids = IdAllocator::seeded(21);
        for _ in 0..100 {
            assert_eq!(ids.allocate(|_| false).unwrap().len(), 9);
        }
    }

    #[test]
    fn allocation_skips_taken_ids() {
        let mut ids = IdAllocator::with_range(StdRng::seed_from_u64(1), 1, 3);
        let taken: HashSet<String> = ["1".to_string(), "3".to_string()].into();

        for _ in 0..20 {
            assert_eq!(ids.allocate(|id| taken.contains(id)).unwrap(), "2");
        }
    }

    #[test]
    fn repeated_allocation_stays_unique() {
        let mut ids = IdAllocator::with_range(StdRng::seed_from_u64(3), 1, 500);
        let mut taken = HashSet::new();

        for _ in 0..400 {
            let id = ids.allocate(|id| taken.contains(id)).unwrap();
            assert!(taken.insert(id), "allocator returned a taken id");
        }
    }

    #[test]
    fn full_range_reports_exhaustion() {
        let mut ids = IdAllocator::with_range(StdRng::seed_from_u64(9), 10, 12);
        let err = ids.allocate(|_| true).unwrap_err();
        assert_eq!(
            err,
            IdError::IdSpaceExhausted {
                min: 10,
                max: 12,
                attempts: MAX_ATTEMPTS
            }
        );
    }
}

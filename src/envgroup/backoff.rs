//! # Allocation Backoff
//!
//! Fibonacci backoff between version allocation attempts. Two writers that
//! collide on the same version number both retry; spreading their retries
//! keeps them from colliding again on the next number.
//!
//! Sequence with the defaults (10ms start, 250ms cap): 10, 10, 20, 30, 50, 80,
//! 130, 210, 250, 250...

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AllocationBackoff {
    prev_ms: u64,
    current_ms: u64,
    max_ms: u64,
}

impl AllocationBackoff {
    /// `max_ms` is raised to `start_ms` if it is smaller
    #[must_use]
    pub fn new(start_ms: u64, max_ms: u64) -> Self {
        Self {
            prev_ms: 0,
            current_ms: start_ms,
            max_ms: max_ms.max(start_ms),
        }
    }

    /// Next delay, advancing the sequence
    pub fn next_delay(&mut self) -> Duration {
        let result = self.current_ms;
        let next = self.prev_ms.saturating_add(self.current_ms);
        self.prev_ms = self.current_ms;
        self.current_ms = next.min(self.max_ms);
        Duration::from_millis(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(backoff: &mut AllocationBackoff, n: usize) -> Vec<u64> {
        (0..n)
            .map(|_| u64::try_from(backoff.next_delay().as_millis()).unwrap())
            .collect()
    }

    #[test]
    fn test_allocation_backoff_sequence() {
        let mut backoff = AllocationBackoff::new(10, 250);
        assert_eq!(
            take(&mut backoff, 10),
            vec![10, 10, 20, 30, 50, 80, 130, 210, 250, 250]
        );
    }

    #[test]
    fn test_allocation_backoff_max_below_start() {
        let mut backoff = AllocationBackoff::new(100, 10);
        assert_eq!(take(&mut backoff, 3), vec![100, 100, 100]);
    }

    #[test]
    fn test_allocation_backoff_zero_start_never_sleeps() {
        let mut backoff = AllocationBackoff::new(0, 0);
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::ZERO);
    }
}

//! # Deadline
//!
//! Deadline handle accepted by every public engine operation.
//!
//! The engine never spawns work of its own, so cancellation is the ordinary
//! Rust kind: dropping the operation future stops it at the next backing-store
//! call. A [`Deadline`] additionally bounds every individual backing-store call
//! (and every retry sleep) by the same absolute instant.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Returned by [`Deadline::bound`] when the deadline passes first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

/// Absolute deadline for one engine operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline; the operation runs until it completes or is dropped
    #[must_use]
    pub fn none() -> Self {
        Self { at: None }
    }

    /// Deadline `timeout` from now
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    /// Run `fut` to completion unless the deadline passes first
    ///
    /// # Errors
    ///
    /// Returns [`Elapsed`] if the deadline is reached before `fut` completes.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        match self.at {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_elapsed| Elapsed),
            None => Ok(fut.await),
        }
    }

    /// Sleep for `duration`, waking early with [`Elapsed`] if the deadline passes
    ///
    /// # Errors
    ///
    /// Returns [`Elapsed`] if the deadline falls inside the sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Elapsed> {
        if let Some(at) = self.at {
            if Instant::now() + duration > at {
                tokio::time::sleep_until(at).await;
                return Err(Elapsed);
            }
        }
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unbounded_deadline_runs_future() {
        let deadline = Deadline::none();
        assert_eq!(deadline.bound(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_times_out_slow_future() {
        let deadline = Deadline::after(Duration::from_millis(50));
        let slow = tokio::time::sleep(Duration::from_secs(5));
        assert_eq!(deadline.bound(slow).await, Err(Elapsed));
        assert_eq!(deadline.bound(async { 7 }).await, Err(Elapsed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_past_deadline_fails() {
        let deadline = Deadline::after(Duration::from_millis(20));
        assert_eq!(deadline.sleep(Duration::from_millis(5)).await, Ok(()));
        assert_eq!(deadline.sleep(Duration::from_millis(100)).await, Err(Elapsed));
    }
}

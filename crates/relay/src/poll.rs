//! Bounded polling
//!
//! One polling shape for every call site that waits on external state:
//! fixed interval, explicit deadline, and a tri-state outcome instead of
//! a thrown timeout. Callers decide what a timeout means; for receipt
//! polling it is explicitly not a failure.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Outcome of a bounded poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe produced a terminal value within the deadline
    Complete(T),
    /// The deadline elapsed with every probe still pending
    TimedOut,
}

/// Poll `probe` at a fixed `interval` until it yields a value, it fails,
/// or `deadline` elapses.
///
/// The probe returns `Ok(None)` while the awaited state is still
/// pending, `Ok(Some(value))` when terminal, and `Err` for a terminal
/// failure, which is propagated immediately.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    deadline: Duration,
    mut probe: F,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    loop {
        if let Some(value) = probe().await? {
            return Ok(PollOutcome::Complete(value));
        }
        if started.elapsed() + interval >= deadline {
            return Ok(PollOutcome::TimedOut);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_completes_when_probe_yields() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let outcome: Result<PollOutcome<u32>, &str> = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(500),
            move || {
                let calls = Arc::clone(&probe_calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) >= 2 {
                        Ok(Some(7))
                    } else {
                        Ok(None)
                    }
                }
            },
        )
        .await;

        assert_eq!(outcome.unwrap(), PollOutcome::Complete(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_when_probe_stays_pending() {
        let outcome: Result<PollOutcome<u32>, &str> = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(25),
            || async { Ok(None) },
        )
        .await;
        assert_eq!(outcome.unwrap(), PollOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_probe_error_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let outcome: Result<PollOutcome<u32>, &str> = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(500),
            move || {
                let calls = Arc::clone(&probe_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("rpc down")
                }
            },
        )
        .await;

        assert_eq!(outcome.unwrap_err(), "rpc down");
        // No retry after a terminal failure.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_runs_at_least_once_with_tiny_deadline() {
        let outcome: Result<PollOutcome<u32>, &str> = poll_until(
            Duration::from_millis(50),
            Duration::from_millis(1),
            || async { Ok(Some(1)) },
        )
        .await;
        assert_eq!(outcome.unwrap(), PollOutcome::Complete(1));
    }
}

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Keeps a fixed cadence between the starts of consecutive actions.
///
/// After an action that started at `started`, the pacer sleeps for
/// `max(interval - elapsed, 0)`. Time spent in the action itself counts towards
/// the interval, so the average rate converges to `1 / interval` and a slow
/// action is followed immediately by the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    /// `per_second <= 0` means unconstrained.
    #[must_use]
    pub fn from_rate(per_second: f64) -> Self {
        let interval = if per_second > 0.0 {
            Duration::try_from_secs_f64(per_second.recip()).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        Self { interval }
    }

    #[must_use]
    pub const fn from_interval(interval: Duration) -> Self {
        Self { interval }
    }

    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    /// Waits out the rest of the interval that began at `started`.
    ///
    /// Returns `false` if `shutdown` fired first. With nothing left to wait the
    /// task still yields once so siblings on the same runtime get to run.
    pub async fn wait_after(&self, started: Instant, shutdown: &CancellationToken) -> bool {
        let wait = self.remaining(started.elapsed());
        if wait.is_zero() {
            tokio::task::yield_now().await;
            return !shutdown.is_cancelled();
        }
        tokio::select! {
            biased;
            () = shutdown.cancelled() => false,
            () = sleep(wait) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[test]
    fn rate_to_interval() {
        assert_eq!(Duration::from_millis(250), Pacer::from_rate(4.0).interval());
        assert_eq!(Duration::ZERO, Pacer::from_rate(0.0).interval());
        assert_eq!(Duration::ZERO, Pacer::from_rate(-3.0).interval());
        assert_eq!(Duration::MAX, Pacer::from_rate(f64::MIN_POSITIVE).interval());
    }

    #[test]
    fn remaining_never_goes_negative() {
        let pacer = Pacer::from_interval(Duration::from_secs(1));
        assert_eq!(Duration::from_millis(700), pacer.remaining(Duration::from_millis(300)));
        assert_eq!(Duration::ZERO, pacer.remaining(Duration::from_secs(1)));
        assert_eq!(Duration::ZERO, pacer.remaining(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_the_rest_of_the_interval() {
        let pacer = Pacer::from_interval(Duration::from_secs(2));
        let token = CancellationToken::new();
        let started = Instant::now();
        time::advance(Duration::from_millis(500)).await;
        assert!(pacer.wait_after(started, &token).await);
        assert_eq!(Duration::from_secs(2), started.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_action_does_not_sleep() {
        let pacer = Pacer::from_interval(Duration::from_secs(1));
        let token = CancellationToken::new();
        let started = Instant::now();
        time::advance(Duration::from_secs(3)).await;
        let before = Instant::now();
        assert!(pacer.wait_after(started, &token).await);
        assert_eq!(before, Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_the_wait() {
        let pacer = Pacer::from_interval(Duration::from_secs(60));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let started = Instant::now();
        assert!(!pacer.wait_after(started, &token).await);
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}

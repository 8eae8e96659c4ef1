use std::future::Future;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::pacing::Pacer;

/// Starts a fixed number of tasks at a bounded average rate.
#[derive(Debug, Clone, Copy)]
pub struct Spawner {
    count: usize,
    pacer: Pacer,
}

impl Spawner {
    /// `per_second <= 0` spawns as fast as the runtime allows.
    #[must_use]
    pub fn new(count: usize, per_second: f64) -> Self {
        Self {
            count,
            pacer: Pacer::from_rate(per_second),
        }
    }

    /// Spawns `make(0)..make(count)` into `tasks` and returns how many were spawned.
    ///
    /// Only the time of the spawn call itself is subtracted from the pacing
    /// interval, a spawned task never holds up the next one. Stops early when
    /// `shutdown` is cancelled.
    pub async fn run<F, Fut>(
        &self,
        tasks: &mut JoinSet<Fut::Output>,
        shutdown: &CancellationToken,
        mut make: F,
    ) -> usize
    where
        F: FnMut(usize) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let mut spawned = 0;
        while spawned < self.count && !shutdown.is_cancelled() {
            let started = Instant::now();
            tasks.spawn(make(spawned));
            spawned += 1;
            if !self.pacer.wait_after(started, shutdown).await {
                break;
            }
        }
        tracing::debug!(spawned, target = self.count, "spawner done");
        spawned
    }
}

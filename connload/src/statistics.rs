use std::time::Duration;

use http_load_util::SharedCounter;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const REPORT_TICK: Duration = Duration::from_secs(1);

/// Counters shared by every session of one execution unit.
#[derive(Debug, Clone, Default)]
pub struct UnitStats {
    established: SharedCounter,
    terminated: SharedCounter,
}

impl UnitStats {
    /// A session completed its first request.
    #[inline]
    pub fn record_established(&self) -> usize {
        self.established.increment()
    }

    /// A session ended because a request failed.
    #[inline]
    pub fn record_terminated(&self) -> usize {
        self.terminated.increment()
    }

    #[inline]
    #[must_use]
    pub fn established(&self) -> usize {
        self.established.get()
    }

    #[inline]
    #[must_use]
    pub fn terminated(&self) -> usize {
        self.terminated.get()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub index: usize,
    pub share: usize,
    pub spawned: usize,
    pub established: usize,
    pub terminated: usize,
}

impl UnitReport {
    #[inline]
    #[must_use]
    pub fn alive(&self) -> usize {
        self.spawned.saturating_sub(self.terminated)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub units: usize,
    pub spawned: usize,
    pub established: usize,
    pub terminated: usize,
}

impl<'a> FromIterator<&'a UnitReport> for LoadSummary {
    fn from_iter<I: IntoIterator<Item = &'a UnitReport>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut acc, report| {
            acc.units += 1;
            acc.spawned += report.spawned;
            acc.established += report.established;
            acc.terminated += report.terminated;
            acc
        })
    }
}

/// Logs once when `target` sessions of the unit have completed a request.
///
/// Checks every [`REPORT_TICK`] and returns right after logging.
pub async fn report_established(stats: UnitStats, unit: usize, target: usize) {
    let mut tick = interval_at(Instant::now() + REPORT_TICK, REPORT_TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let established = stats.established();
        if established >= target {
            tracing::info!(unit, established, "established {established} connections");
            return;
        }
    }
}

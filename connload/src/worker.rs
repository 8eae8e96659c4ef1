use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::Connector;
use crate::config::{LoadPlan, TargetSpec};
use crate::distributor::{DistributorError, UnitShare};
use crate::session::{Session, SessionEnd};
use crate::spawner::Spawner;
use crate::statistics::{self, UnitReport, UnitStats};

/// One execution unit: a single threaded runtime driving a share of the sessions.
pub struct Unit<C: Connector> {
    share: UnitShare,
    request_interval: Duration,
    exit_when_drained: bool,
    target: Arc<TargetSpec>,
    connector: Arc<C>,
}

impl<C: Connector> Unit<C> {
    #[must_use]
    pub fn new(share: UnitShare, plan: &LoadPlan, target: Arc<TargetSpec>, connector: C) -> Self {
        Self {
            share,
            request_interval: plan.request_interval,
            exit_when_drained: plan.exit_when_drained,
            target,
            connector: Arc::new(connector),
        }
    }

    /// Blocks the calling thread until the unit is done.
    pub fn run(self, shutdown: CancellationToken) -> Result<UnitReport, DistributorError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| DistributorError::Runtime {
                unit: self.share.index,
                source,
            })?;
        Ok(rt.block_on(self.drive(shutdown)))
    }

    /// Spawns the share of sessions, then waits for `shutdown`.
    ///
    /// With `exit_when_drained` the unit also ends once every session it spawned
    /// has ended.
    pub async fn drive(self, shutdown: CancellationToken) -> UnitReport {
        let Self {
            share,
            request_interval,
            exit_when_drained,
            target,
            connector,
        } = self;
        let span = tracing::info_span!("unit", index = share.index);
        async move {
            tracing::info!(
                connections = share.connections,
                rate = share.rate,
                "starting unit"
            );
            let stats = UnitStats::default();
            let reporter = tokio::spawn(
                statistics::report_established(stats.clone(), share.index, share.connections)
                    .in_current_span(),
            );

            let mut sessions = JoinSet::new();
            let spawned = Spawner::new(share.connections, share.rate)
                .run(&mut sessions, &shutdown, |id| {
                    let mut session = Session::new(
                        connector.clone(),
                        target.clone(),
                        request_interval,
                        stats.clone(),
                    );
                    let shutdown = shutdown.clone();
                    async move { session.run(&shutdown).await }
                        .instrument(tracing::debug_span!("session", id))
                })
                .await;

            loop {
                if exit_when_drained && sessions.is_empty() {
                    tracing::info!("every session ended");
                    break;
                }
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    Some(joined) = sessions.join_next() => record(joined),
                }
            }
            while let Some(joined) = sessions.join_next().await {
                record(joined);
            }
            reporter.abort();

            let report = UnitReport {
                index: share.index,
                share: share.connections,
                spawned,
                established: stats.established(),
                terminated: stats.terminated(),
            };
            tracing::info!(
                spawned = report.spawned,
                established = report.established,
                terminated = report.terminated,
                "unit stopped"
            );
            report
        }
        .instrument(span)
        .await
    }
}

fn record(joined: Result<SessionEnd, JoinError>) {
    match joined {
        Ok(end) => tracing::trace!(requests = end.requests(), "session joined"),
        Err(err) if err.is_panic() => tracing::error!(%err, "session panicked"),
        Err(err) => tracing::debug!(%err, "session aborted"),
    }
}

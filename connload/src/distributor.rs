use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;

use crate::client::Connector;
use crate::config::{LoadPlan, TargetSpec};
use crate::split::split;
use crate::statistics::UnitReport;
use crate::worker::Unit;

#[derive(Debug, thiserror::Error)]
pub enum DistributorError {
    #[error("failed to start unit {unit}: {source}")]
    Spawn {
        unit: usize,
        #[source]
        source: std::io::Error,
        /// Units started before the failed one that then failed or panicked.
        failed: Vec<usize>,
    },
    #[error("failed to build runtime for unit {unit}: {source}")]
    Runtime {
        unit: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("units {0:?} did not finish cleanly")]
    UnitsFailed(Vec<usize>),
}

/// The part of the load plan one execution unit is responsible for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitShare {
    pub index: usize,
    pub connections: usize,
    /// Connections per second for this unit, proportional to its share.
    pub rate: f64,
}

/// Splits the plan over its units, leaving out units that would get no connections.
#[must_use]
pub fn unit_shares(plan: &LoadPlan) -> Vec<UnitShare> {
    split(plan.connections, plan.units)
        .into_iter()
        .enumerate()
        .filter(|&(_, connections)| connections > 0)
        .map(|(index, connections)| UnitShare {
            index,
            connections,
            rate: plan.connection_rate * connections as f64 / plan.connections as f64,
        })
        .collect()
}

/// Runs every non-empty unit on its own thread and waits for all of them.
///
/// Units only finish once `shutdown` is cancelled, or when every one of their
/// sessions ended and the plan asks to exit when drained.
pub fn launch<C, F>(
    plan: &LoadPlan,
    target: Arc<TargetSpec>,
    mut make_connector: F,
    shutdown: CancellationToken,
) -> Result<Vec<UnitReport>, DistributorError>
where
    C: Connector,
    F: FnMut(&TargetSpec) -> C,
{
    let shares = unit_shares(plan);
    if shares.is_empty() {
        tracing::info!("no connections requested, nothing to launch");
        return Ok(Vec::new());
    }
    tracing::info!(
        units = shares.len(),
        connections = plan.connections,
        rate = plan.connection_rate,
        interval = ?plan.request_interval,
        "launching units"
    );

    let mut handles = Vec::with_capacity(shares.len());
    for share in shares {
        let unit = Unit::new(share, plan, target.clone(), make_connector(&target));
        let token = shutdown.clone();
        let spawned = thread::Builder::new()
            .name(format!("unit-{}", share.index))
            .spawn(move || unit.run(token));
        match spawned {
            Ok(handle) => handles.push((share.index, handle)),
            Err(source) => {
                // Take down what already runs before reporting.
                shutdown.cancel();
                return Err(abort_launch(handles, share.index, source));
            }
        }
    }
    join_all(handles)
}

type UnitHandle = thread::JoinHandle<Result<UnitReport, DistributorError>>;

fn join_all(handles: Vec<(usize, UnitHandle)>) -> Result<Vec<UnitReport>, DistributorError> {
    let (reports, failed) = join_units(handles);
    if failed.is_empty() {
        Ok(reports)
    } else {
        Err(DistributorError::UnitsFailed(failed))
    }
}

fn abort_launch(
    handles: Vec<(usize, UnitHandle)>,
    unit: usize,
    source: std::io::Error,
) -> DistributorError {
    let (stopped, failed) = join_units(handles);
    tracing::warn!(
        unit,
        stopped = stopped.len(),
        failed = failed.len(),
        "launch aborted, joined units already running"
    );
    DistributorError::Spawn {
        unit,
        source,
        failed,
    }
}

fn join_units(handles: Vec<(usize, UnitHandle)>) -> (Vec<UnitReport>, Vec<usize>) {
    let mut reports = Vec::with_capacity(handles.len());
    let mut failed = Vec::new();
    for (index, handle) in handles {
        match handle.join() {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(err)) => {
                tracing::error!(unit = index, %err, "unit failed");
                failed.push(index);
            }
            Err(_) => {
                tracing::error!(unit = index, "unit panicked");
                failed.push(index);
            }
        }
    }
    (reports, failed)
}

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use connload::client::HyperConnector;
use connload::config::{KeepAlive, LoadPlan, TargetSpec};
use connload::distributor;
use connload::statistics::{LoadSummary, UnitReport};
use connload::telemetry;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Opens and keeps many concurrent HTTP sessions against a target.
#[derive(Debug, Clone, Parser)]
#[command(name = "connload", version, about, long_about = None)]
struct Args {
    /// target url, plain http only
    #[arg(value_name = "URL")]
    url: String,

    /// total number of concurrent sessions
    #[arg(long, value_name = "N")]
    connections: usize,

    /// new sessions per second over all units (0 = as fast as possible)
    #[arg(long, value_name = "RATE", default_value_t = 0.)]
    connection_per_second: f64,

    /// seconds between the starts of two requests of one session
    #[arg(long, value_name = "SECONDS", default_value_t = 0.)]
    request_interval: f64,

    /// number of execution units (default: available parallelism)
    #[arg(long, value_name = "N")]
    processes: Option<usize>,

    /// open a new connection for every request
    #[arg(long, default_value_t = false)]
    no_keep_alive: bool,

    #[arg(long, value_name = "SECONDS")]
    connect_timeout: Option<f64>,

    #[arg(long, value_name = "SECONDS")]
    read_timeout: Option<f64>,

    /// end a unit once all of its sessions have failed instead of idling until killed
    #[arg(long, default_value_t = false)]
    exit_when_drained: bool,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(
        long,
        short = 'v',
        env = "DEBUG",
        default_value_t = false,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    verbose: bool,

    #[cfg(target_family = "unix")]
    /// Set the limit of max open file descriptors for this process.
    #[arg(long, value_name = "N", default_value_t = 262_144)]
    ulimit: connload::os::rlim_t,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = telemetry::init_tracing(args.verbose) {
        eprintln!("failed to set up logging: {err:#}");
    }
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to build runtime: {err}");
            std::process::exit(1);
        }
    };
    let _guard = rt.enter();
    if let Err(err) = rt.block_on(run_with_args(args)) {
        tracing::error!("exit with error: {err:#}");
        std::process::exit(1);
    }
}

async fn run_with_args(args: Args) -> anyhow::Result<()> {
    #[cfg(target_family = "unix")]
    connload::os::raise_nofile(args.ulimit).context("set file descriptor limit")?;

    let target = TargetSpec::new(
        &args.url,
        args.connect_timeout,
        args.read_timeout,
        KeepAlive::from_no_keep_alive(args.no_keep_alive),
    )
    .context("invalid target")?;
    let plan = LoadPlan::new(
        args.connections,
        args.connection_per_second,
        args.request_interval,
        args.processes,
    )
    .context("invalid load plan")?
    .exit_when_drained(args.exit_when_drained);
    tracing::info!(url = %target.uri, keep_alive = ?target.keep_alive, "target");

    let shutdown = CancellationToken::new();
    let reports = run_units(plan, Arc::new(target), shutdown).await?;
    let summary: LoadSummary = reports.iter().collect();
    tracing::info!(
        units = summary.units,
        spawned = summary.spawned,
        established = summary.established,
        terminated = summary.terminated,
        "done"
    );
    Ok(())
}

async fn run_units(
    plan: LoadPlan,
    target: Arc<TargetSpec>,
    shutdown: CancellationToken,
) -> anyhow::Result<Vec<UnitReport>> {
    let mut units = {
        let shutdown = shutdown.clone();
        tokio::task::spawn_blocking(move || {
            distributor::launch(&plan, target, HyperConnector::new, shutdown)
        })
    };
    let finished = tokio::select! {
        joined = &mut units => Some(joined),
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for ctrl-c")?;
            None
        }
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            tracing::info!("shutdown signal received, stopping units");
            shutdown.cancel();
            units.await
        }
    };
    let reports = joined.context("join distributor")??;
    Ok(reports)
}

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use clap::Parser;
use http_load_util::SharedCounter;

const INDEX_BODY: &str = "ok\n";

/// Answers every request cheaply so the client side is what gets measured.
#[derive(Debug, Parser)]
#[command(name = "sink-server", version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// worker threads of the runtime (default: available parallelism)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Clone, Default)]
struct Counters {
    requests: SharedCounter,
    failures: SharedCounter,
}

#[derive(Debug, serde::Serialize)]
struct StatsResponse {
    requests: usize,
    failures: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = args.threads {
        builder.worker_threads(threads);
    }
    let rt = builder.enable_all().build().context("build runtime")?;
    let _g = rt.enter();
    rt.block_on(run_server(args.listen))
}

fn router(counters: Counters) -> axum::Router {
    axum::Router::new()
        .route("/", get(get_index))
        .route("/status/:code", get(get_status))
        .route("/stats", get(get_stats))
        .with_state(counters)
}

async fn run_server(listen: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    let counters = Counters::default();
    tokio::spawn(log_rate(counters.clone()));
    tracing::info!(%listen, "sink server listening");
    axum::serve(listener, router(counters))
        .await
        .context("serve")
}

async fn log_rate(counters: Counters) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let mut last = 0;
    loop {
        tick.tick().await;
        let total = counters.requests.get();
        if total != last {
            tracing::info!(
                per_second = total - last,
                total,
                failures = counters.failures.get(),
                "requests"
            );
            last = total;
        }
    }
}

#[inline]
async fn get_index(State(counters): State<Counters>) -> &'static str {
    counters.requests.increment();
    INDEX_BODY
}

#[inline]
async fn get_status(State(counters): State<Counters>, Path(code): Path<u16>) -> StatusCode {
    counters.requests.increment();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    if status.is_client_error() || status.is_server_error() {
        counters.failures.increment();
    }
    status
}

#[inline]
async fn get_stats(State(counters): State<Counters>) -> Json<StatsResponse> {
    Json(StatsResponse {
        requests: counters.requests.get(),
        failures: counters.failures.get(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn status_of(router: axum::Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn counts_requests_and_failures() {
        let counters = Counters::default();
        assert_eq!(StatusCode::OK, status_of(router(counters.clone()), "/").await);
        assert_eq!(
            StatusCode::SERVICE_UNAVAILABLE,
            status_of(router(counters.clone()), "/status/503").await
        );
        assert_eq!(
            StatusCode::FOUND,
            status_of(router(counters.clone()), "/status/302").await
        );
        assert_eq!(3, counters.requests.get());
        assert_eq!(1, counters.failures.get());
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{check_status, Connection, Connector, RequestError};
use crate::config::{KeepAlive, TargetSpec};
use crate::pacing::Pacer;
use crate::statistics::UnitStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Alive,
    Terminated,
}

/// Why a session stopped issuing requests.
#[derive(Debug)]
pub enum SessionEnd {
    Failed { requests: u64, error: RequestError },
    Cancelled { requests: u64 },
}

impl SessionEnd {
    #[must_use]
    pub fn requests(&self) -> u64 {
        match self {
            Self::Failed { requests, .. } | Self::Cancelled { requests } => *requests,
        }
    }
}

/// One simulated client: issues requests one after another until one fails.
pub struct Session<C: Connector> {
    connector: Arc<C>,
    target: Arc<TargetSpec>,
    pacer: Pacer,
    stats: UnitStats,
    conn: Option<C::Conn>,
    state: SessionState,
    requests: u64,
    established: bool,
}

impl<C: Connector> Session<C> {
    #[must_use]
    pub fn new(
        connector: Arc<C>,
        target: Arc<TargetSpec>,
        request_interval: Duration,
        stats: UnitStats,
    ) -> Self {
        Self {
            connector,
            target,
            pacer: Pacer::from_interval(request_interval),
            stats,
            conn: None,
            state: SessionState::Alive,
            requests: 0,
            established: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Runs until a request fails or `shutdown` is cancelled.
    ///
    /// The interval is measured from the start of one request to the start of
    /// the next, a request slower than the interval is followed immediately.
    pub async fn run(&mut self, shutdown: &CancellationToken) -> SessionEnd {
        while self.state == SessionState::Alive {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                result = self.step() => Some(result),
            };
            match outcome {
                None => break,
                Some(Err(error)) => {
                    return SessionEnd::Failed {
                        requests: self.requests,
                        error,
                    };
                }
                Some(Ok(())) => {}
            }
            if !self.pacer.wait_after(started, shutdown).await {
                break;
            }
        }
        self.release();
        self.state = SessionState::Terminated;
        SessionEnd::Cancelled {
            requests: self.requests,
        }
    }

    async fn step(&mut self) -> Result<(), RequestError> {
        let conn = self.conn.get_or_insert_with(|| self.connector.open());
        let sent = Instant::now();
        let result = conn.request(&self.target).await.and_then(check_status);
        self.requests += 1;
        let elapsed_ms = sent.elapsed().as_millis();
        match result {
            Ok(status) => {
                tracing::debug!(%status, elapsed_ms, request = self.requests, "request completed");
                if !self.established {
                    self.established = true;
                    self.stats.record_established();
                }
                if self.target.keep_alive == KeepAlive::Fresh {
                    self.release();
                }
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, elapsed_ms, request = self.requests, "request failed, ending session");
                self.release();
                self.state = SessionState::Terminated;
                self.stats.record_terminated();
                Err(error)
            }
        }
    }

    fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hyper::StatusCode;
use tokio::time::Instant;

use crate::client::{Connection, Connector, RequestError};
use crate::config::{KeepAlive, TargetSpec};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Issued {
    pub handle: usize,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Ledger {
    opened: AtomicUsize,
    closed: AtomicUsize,
    issued: Mutex<Vec<Issued>>,
}

/// In-memory target. Request `n` (1-based, counted over every handle) fails
/// once `n >= fail_from`.
#[derive(Debug, Clone)]
pub(crate) struct FakeConnector {
    ledger: Arc<Ledger>,
    fail_from: Option<usize>,
    latency: Duration,
}

impl FakeConnector {
    pub fn healthy() -> Self {
        Self {
            ledger: Arc::default(),
            fail_from: None,
            latency: Duration::ZERO,
        }
    }

    pub fn failing_from(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::healthy()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn opened(&self) -> usize {
        self.ledger.opened.load(Ordering::Acquire)
    }

    pub fn closed(&self) -> usize {
        self.ledger.closed.load(Ordering::Acquire)
    }

    pub fn issued(&self) -> Vec<Issued> {
        self.ledger.issued.lock().unwrap().clone()
    }

    pub fn handles_used(&self) -> BTreeSet<usize> {
        self.issued().iter().map(|i| i.handle).collect()
    }
}

impl Connector for FakeConnector {
    type Conn = FakeConn;

    fn open(&self) -> FakeConn {
        let handle = self.ledger.opened.fetch_add(1, Ordering::AcqRel);
        FakeConn {
            handle,
            connector: self.clone(),
        }
    }
}

pub(crate) struct FakeConn {
    handle: usize,
    connector: FakeConnector,
}

impl Connection for FakeConn {
    fn request<'a>(
        &'a mut self,
        _target: &'a TargetSpec,
    ) -> impl Future<Output = Result<StatusCode, RequestError>> + Send + 'a {
        async move {
            let n = {
                let mut issued = self.connector.ledger.issued.lock().unwrap();
                issued.push(Issued {
                    handle: self.handle,
                    at: Instant::now(),
                });
                issued.len()
            };
            if !self.connector.latency.is_zero() {
                tokio::time::sleep(self.connector.latency).await;
            }
            match self.connector.fail_from {
                Some(from) if n >= from => Err(RequestError::Status(StatusCode::SERVICE_UNAVAILABLE)),
                _ => Ok(StatusCode::OK),
            }
        }
    }

    fn close(self) {
        self.connector.ledger.closed.fetch_add(1, Ordering::AcqRel);
    }
}

pub(crate) fn target(keep_alive: KeepAlive) -> Arc<TargetSpec> {
    Arc::new(TargetSpec::new("http://127.0.0.1:8080/", None, None, keep_alive).unwrap())
}

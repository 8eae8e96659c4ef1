use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use http_load_util::drain::DrainBodyFuture;
use http_load_util::empty_body;
use hyper::header::{HeaderValue, CONNECTION, USER_AGENT};
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::{KeepAlive, TargetSpec};

const AGENT: &str = concat!("connload/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("failed to build request: {0}")]
    Build(#[from] http::Error),
    #[error("request failed: {0}")]
    Transport(#[source] hyper_util::client::legacy::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to read response body: {0:#}")]
    Body(anyhow::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// A 2xx or 3xx status counts as success, anything else fails the request.
pub fn check_status(status: StatusCode) -> Result<StatusCode, RequestError> {
    if status.is_success() || status.is_redirection() {
        Ok(status)
    } else {
        Err(RequestError::Status(status))
    }
}

/// Opens connection handles for sessions.
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    fn open(&self) -> Self::Conn;
}

/// A handle that can issue requests to the target one at a time.
pub trait Connection: Sized + Send + 'static {
    /// Issues a single request and returns the response status.
    fn request<'a>(
        &'a mut self,
        target: &'a TargetSpec,
    ) -> impl Future<Output = Result<StatusCode, RequestError>> + Send + 'a;

    /// Releases the handle and whatever connection it holds.
    fn close(self) {}
}

/// Hands out [`HttpClient`]s configured for a target.
#[derive(Debug, Clone)]
pub struct HyperConnector {
    connect_timeout: Option<Duration>,
    keep_alive: KeepAlive,
}

impl HyperConnector {
    #[must_use]
    pub fn new(target: &TargetSpec) -> Self {
        Self {
            connect_timeout: target.connect_timeout,
            keep_alive: target.keep_alive,
        }
    }
}

impl Connector for HyperConnector {
    type Conn = HttpClient;

    fn open(&self) -> HttpClient {
        HttpClient::new(self.connect_timeout, self.keep_alive)
    }
}

/// Client with a private pool of at most one idle connection.
///
/// One of these belongs to exactly one session, so with keep-alive the session
/// keeps talking over the same socket for as long as the server allows it.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    keep_alive: KeepAlive,
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>, keep_alive: KeepAlive) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(connect_timeout);
        connector.set_nodelay(true);
        let max_idle = match keep_alive {
            KeepAlive::Reuse => 1,
            KeepAlive::Fresh => 0,
        };
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(max_idle)
            .build(connector);
        Self { client, keep_alive }
    }

    pub async fn send_recv(&mut self, target: &TargetSpec) -> Result<StatusCode, RequestError> {
        let mut builder = Request::get(target.uri.clone())
            .header(USER_AGENT, HeaderValue::from_static(AGENT));
        if self.keep_alive == KeepAlive::Fresh {
            builder = builder.header(CONNECTION, HeaderValue::from_static("close"));
        }
        let request = builder.body(empty_body())?;
        let resp = within(target.response_timeout(), self.client.request(request))
            .await?
            .map_err(RequestError::Transport)?;
        let status = resp.status();
        let drained = within(target.read_timeout, DrainBodyFuture::new(resp.into_body()))
            .await?
            .map_err(RequestError::Body)?;
        tracing::trace!(%status, drained, "response drained");
        Ok(status)
    }
}

impl Connection for HttpClient {
    fn request<'a>(
        &'a mut self,
        target: &'a TargetSpec,
    ) -> impl Future<Output = Result<StatusCode, RequestError>> + Send + 'a {
        self.send_recv(target)
    }
}

async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, RequestError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RequestError::Timeout(limit)),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_redirects_pass() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(check_status(StatusCode::NO_CONTENT).is_ok());
        assert!(check_status(StatusCode::MOVED_PERMANENTLY).is_ok());
        assert!(check_status(StatusCode::NOT_MODIFIED).is_ok());
    }

    #[test]
    fn errors_and_informational_fail() {
        for status in [
            StatusCode::CONTINUE,
            StatusCode::NOT_FOUND,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(matches!(check_status(status), Err(RequestError::Status(s)) if s == status));
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // Bind and drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = TargetSpec::new(
            &format!("http://{addr}/"),
            Some(1.0),
            Some(1.0),
            KeepAlive::Reuse,
        )
        .unwrap();
        let mut conn = HyperConnector::new(&target).open();
        let err = conn.request(&target).await.unwrap_err();
        assert!(matches!(err, RequestError::Transport(_)), "{err}");
    }
}

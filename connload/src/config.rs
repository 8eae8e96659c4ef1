use std::num::NonZeroUsize;
use std::time::Duration;

use http::uri::InvalidUri;
use hyper::Uri;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: InvalidUri,
    },
    #[error("url {0:?} has no scheme, expected http://")]
    MissingScheme(String),
    #[error("unsupported scheme {0:?}, only http is supported")]
    UnsupportedScheme(String),
    #[error("url {0:?} has no host")]
    MissingHost(String),
    #[error("connection rate must be a finite number >= 0, got {0}")]
    InvalidRate(f64),
    #[error("{name} must be a finite number of seconds >= 0, got {value}")]
    InvalidSeconds { name: &'static str, value: f64 },
    #[error("{name} must be a finite number of seconds > 0, got {value}")]
    InvalidTimeout { name: &'static str, value: f64 },
    #[error("the number of execution units must be at least 1")]
    ZeroUnits,
}

/// Whether a session keeps its connection between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAlive {
    Reuse,
    Fresh,
}

impl KeepAlive {
    #[inline]
    #[must_use]
    pub fn from_no_keep_alive(no_keep_alive: bool) -> Self {
        if no_keep_alive {
            Self::Fresh
        } else {
            Self::Reuse
        }
    }
}

/// What every session talks to, and how.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub uri: Uri,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub keep_alive: KeepAlive,
}

impl TargetSpec {
    pub fn new(
        url: &str,
        connect_timeout: Option<f64>,
        read_timeout: Option<f64>,
        keep_alive: KeepAlive,
    ) -> Result<Self, ConfigError> {
        let uri: Uri = url.parse().map_err(|source| ConfigError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(ConfigError::UnsupportedScheme(other.to_owned())),
            None => return Err(ConfigError::MissingScheme(url.to_owned())),
        }
        if uri.host().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingHost(url.to_owned()));
        }
        Ok(Self {
            uri,
            connect_timeout: connect_timeout
                .map(|value| timeout("connect timeout", value))
                .transpose()?,
            read_timeout: read_timeout
                .map(|value| timeout("read timeout", value))
                .transpose()?,
            keep_alive,
        })
    }

    /// Upper bound for receiving the response head, which includes connecting.
    #[must_use]
    pub fn response_timeout(&self) -> Option<Duration> {
        self.read_timeout
            .map(|read| read + self.connect_timeout.unwrap_or_default())
    }
}

/// How much load to generate and how to spread it.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub connections: usize,
    /// New connections per second over all units, `0.0` means unconstrained.
    pub connection_rate: f64,
    pub request_interval: Duration,
    pub units: NonZeroUsize,
    pub exit_when_drained: bool,
}

impl LoadPlan {
    pub fn new(
        connections: usize,
        connection_rate: f64,
        request_interval: f64,
        units: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if !connection_rate.is_finite() || connection_rate < 0.0 {
            return Err(ConfigError::InvalidRate(connection_rate));
        }
        let units = match units {
            Some(n) => NonZeroUsize::new(n).ok_or(ConfigError::ZeroUnits)?,
            None => default_units(),
        };
        Ok(Self {
            connections,
            connection_rate,
            request_interval: seconds("request interval", request_interval)?,
            units,
            exit_when_drained: false,
        })
    }

    #[must_use]
    pub fn exit_when_drained(mut self, exit_when_drained: bool) -> Self {
        self.exit_when_drained = exit_when_drained;
        self
    }
}

#[must_use]
pub fn default_units() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidSeconds { name, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidSeconds { name, value })
}

fn timeout(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidTimeout { name, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidTimeout { name, value })
}

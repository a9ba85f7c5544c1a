use std::time::Duration;

use tracing::warn;

use crate::admin::Admin;
use crate::cluster::{ClusterConnection, Slot, DEFAULT_PORT};
use crate::core::connection::NodeConnection;
use crate::proto::error::{Error, Result};

/// Default number of members contacted concurrently by a fan-out.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Resolved settings shared by the node and cluster transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    /// Seed addresses as `host:port`, tried in order.
    pub seeds: Vec<String>,
    /// Password sent with `AUTH` on every new connection.
    pub password: Option<String>,
    /// Maximum time to establish a TCP connection.
    pub connection_timeout: Option<Duration>,
    /// Maximum time to wait for a reply.
    pub read_timeout: Option<Duration>,
    /// Members contacted concurrently by [`Admin::apply_config`].
    pub max_in_flight: usize,
    /// Highest slot number of the cluster.
    pub hash_max_slot: Slot,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            password: None,
            connection_timeout: None,
            read_timeout: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            hash_max_slot: Slot::MAX,
        }
    }
}

/// Builder for an [`Admin`] talking to a live cluster.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use clustermap::AdminBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let admin = AdminBuilder::new()
///     .seeds("redis://10.0.0.1:7000,10.0.0.2:7000")
///     .password("secret")
///     .connection_timeout(Duration::from_secs(2))
///     .build()
///     .await?;
/// let nodes = admin.get_topology().await?;
/// println!("{}", nodes);
/// admin.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct AdminBuilder {
    seeds: Vec<String>,
    password: Option<String>,
    connection_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    max_in_flight: Option<usize>,
}

impl AdminBuilder {
    /// Creates a new [`AdminBuilder`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds seed addresses.
    ///
    /// Accepts `redis://host:port`, bare `host:port` or a comma-separated
    /// list of either. The port defaults to 6379.
    #[inline]
    pub fn seeds(mut self, addresses: impl Into<String>) -> Self {
        self.seeds.push(addresses.into());
        self
    }

    /// Sets the password for authentication.
    #[inline]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the connection timeout.
    #[inline]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout. `None` waits forever.
    #[inline]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets how many members a fan-out contacts at once (default: 8).
    #[inline]
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Validates the settings without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if no seed is given, a seed is not
    /// a valid address, or `max_in_flight` is zero.
    pub fn config(self) -> Result<AdminConfig> {
        let mut seeds = Vec::new();
        for list in &self.seeds {
            for address in list.split(',').map(str::trim).filter(|a| !a.is_empty()) {
                seeds.push(parse_seed(address)?);
            }
        }
        if seeds.is_empty() {
            return Err(invalid("at least one seed address is required"));
        }

        let max_in_flight = self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT);
        if max_in_flight == 0 {
            return Err(invalid("max_in_flight must be at least 1"));
        }

        Ok(AdminConfig {
            seeds,
            password: self.password,
            connection_timeout: self.connection_timeout,
            read_timeout: self.read_timeout,
            max_in_flight,
            hash_max_slot: Slot::MAX,
        })
    }

    /// Connects to the first reachable seed and builds the [`Admin`].
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`config`](AdminBuilder::config), or
    /// the error of the last seed when none can be reached.
    pub async fn build(self) -> Result<Admin<NodeConnection, ClusterConnection>> {
        let config = self.config()?;

        let mut last_error = None;
        for seed in &config.seeds {
            match NodeConnection::connect(seed, &config).await {
                Ok(node) => {
                    let cluster = ClusterConnection::new(config.clone());
                    return Ok(Admin::new(node, cluster, config));
                }
                Err(e) => {
                    warn!(seed = %seed, error = %e, "seed unreachable");
                    last_error = Some(e);
                }
            }
        }
        Err(Error::transport(
            "connect to seed",
            last_error.unwrap_or_else(|| invalid("no seed address")),
        ))
    }
}

/// Normalizes one seed into `host:port`.
fn parse_seed(address: &str) -> Result<String> {
    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    };

    let parsed = url::Url::parse(&with_scheme)
        .map_err(|e| invalid(format!("invalid seed address '{}': {}", address, e)))?;
    if parsed.scheme() != "redis" {
        return Err(invalid(format!(
            "invalid scheme in '{}', expected redis://",
            address
        )));
    }
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid(format!("missing host in '{}'", address)))?;
    let port = parsed.port().unwrap_or(DEFAULT_PORT);
    Ok(format!("{}:{}", host, port))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidArgument {
        message: message.into(),
    }
}

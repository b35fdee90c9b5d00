//! Client configuration with builder pattern.
//!
//! Provides type-safe configuration for SDK clients including:
//! - Cluster id and replica addresses
//! - Concurrency and message size limits
//! - Client-side validation mode
//! - Metrics backend

use std::{fmt, sync::Arc};

use snafu::ensure;
use tally_types::{Account, DEFAULT_MAX_BODY_BYTES, Record};

use crate::{
    error::{ConfigSnafu, InvalidAddressSnafu, Result},
    metrics::{SdkMetrics, default_metrics},
};

/// Default number of requests allowed in flight at once.
const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Host used for replica addresses given as a bare port.
const DEFAULT_HOST: &str = "127.0.0.1";

/// A parsed replica address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplicaAddress {
    /// Host name or IP literal, without brackets.
    pub host: String,
    /// Port in `1..=65535`.
    pub port: u16,
}

impl ReplicaAddress {
    /// Parses `port`, `host:port`, `ip:port` or `[ipv6]:port`.
    ///
    /// A bare port refers to `127.0.0.1`.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::InvalidAddress` if the entry is empty, has an empty
    /// host, or its port is not in `1..=65535`.
    pub fn parse(address: &str) -> Result<Self> {
        let trimmed = address.trim();
        ensure!(!trimmed.is_empty(), InvalidAddressSnafu { address, message: "address is empty" });

        let (host, port) = match trimmed.rsplit_once(':') {
            Some((host, port)) if !host.ends_with(':') => (host, port),
            _ => (DEFAULT_HOST, trimmed),
        };
        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);

        ensure!(!host.is_empty(), InvalidAddressSnafu { address, message: "host is empty" });
        ensure!(
            !host.contains(char::is_whitespace),
            InvalidAddressSnafu { address, message: "host cannot contain whitespace" }
        );
        ensure!(
            !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
            InvalidAddressSnafu { address, message: "port must be a number" }
        );

        let port = match port.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => {
                return InvalidAddressSnafu { address, message: "port must be in 1..=65535" }
                    .fail();
            },
        };

        Ok(Self { host: host.to_owned(), port })
    }
}

impl fmt::Display for ReplicaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// What the client does when a record fails client-side validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Logs a warning and sends the batch anyway; the ledger decides.
    #[default]
    Advisory,
    /// Fails the call with `SdkError::Validation` before sending.
    Enforce,
}

/// Configuration for the ledger client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cluster the replicas belong to.
    pub(crate) cluster: u32,

    /// Parsed replica addresses.
    pub(crate) replica_addresses: Vec<ReplicaAddress>,

    /// Requests allowed in flight at once.
    pub(crate) max_concurrency: usize,

    /// Largest request body in bytes.
    pub(crate) max_message_bytes: usize,

    /// Client-side validation behaviour.
    pub(crate) validation: ValidationMode,

    /// Metrics backend.
    pub(crate) metrics: Arc<dyn SdkMetrics>,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the cluster id.
    #[must_use]
    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    /// Returns the replica addresses.
    #[must_use]
    pub fn replica_addresses(&self) -> &[ReplicaAddress] {
        &self.replica_addresses
    }

    /// Returns the concurrency limit.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Returns the request body limit in bytes.
    #[must_use]
    pub fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    /// Returns the validation mode.
    #[must_use]
    pub fn validation(&self) -> ValidationMode {
        self.validation
    }

    /// Returns the metrics backend.
    #[must_use]
    pub fn metrics(&self) -> &Arc<dyn SdkMetrics> {
        &self.metrics
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    cluster: u32,
    replica_addresses: Vec<String>,
    max_concurrency: Option<usize>,
    max_message_bytes: Option<usize>,
    validation: ValidationMode,
    metrics: Option<Arc<dyn SdkMetrics>>,
}

impl ClientConfigBuilder {
    /// Sets the cluster id.
    #[must_use]
    pub fn with_cluster(mut self, cluster: u32) -> Self {
        self.cluster = cluster;
        self
    }

    /// Sets the replica addresses.
    ///
    /// At least one address must be provided. Each entry is `port`,
    /// `host:port` or `ip:port`.
    #[must_use]
    pub fn with_replica_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replica_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a single replica address.
    #[must_use]
    pub fn with_replica_address<S: Into<String>>(mut self, address: S) -> Self {
        self.replica_addresses.push(address.into());
        self
    }

    /// Sets how many requests may be in flight at once.
    ///
    /// Default: 32. Must be at least 1.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Sets the largest request body in bytes.
    ///
    /// Default: one ledger message minus its header. Must fit at least one
    /// record.
    #[must_use]
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = Some(max_message_bytes);
        self
    }

    /// Sets the client-side validation mode.
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// Sets the metrics backend.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn SdkMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the configuration, validating all fields.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Config` if no replica address is given, the
    /// concurrency limit is zero, or the message limit cannot hold one record.
    /// Returns `SdkError::InvalidAddress` for an unparseable address.
    pub fn build(self) -> Result<ClientConfig> {
        ensure!(
            !self.replica_addresses.is_empty(),
            ConfigSnafu { message: "at least one replica address is required" }
        );

        let replica_addresses = self
            .replica_addresses
            .iter()
            .map(|address| ReplicaAddress::parse(address))
            .collect::<Result<Vec<_>>>()?;

        let max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        ensure!(
            max_concurrency >= 1,
            ConfigSnafu { message: "max_concurrency must be at least 1" }
        );

        let max_message_bytes = self.max_message_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
        ensure!(
            max_message_bytes >= Account::SIZE,
            ConfigSnafu {
                message: format!("max_message_bytes must be at least {} bytes", Account::SIZE)
            }
        );

        Ok(ClientConfig {
            cluster: self.cluster,
            replica_addresses,
            max_concurrency,
            max_message_bytes,
            validation: self.validation,
            metrics: self.metrics.unwrap_or_else(default_metrics),
        })
    }
}

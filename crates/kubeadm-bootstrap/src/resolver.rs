//! Master address resolution.
//!
//! Masters follow the naming scheme `{dc}-{cluster}master-{i}.{domain}`. Each one is
//! looked up in index order and the first answer is kept, so position in the
//! resulting list encodes the master index. The cluster service IP always comes last.

use std::fmt;
use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::BootstrapError;
use crate::retry::{with_retry_async, RetryConfig};

/// Errors from a single hostname lookup.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The name exists but returned no address records.
    #[error("no address records")]
    NoRecords,

    /// Timeout or temporary resolver failure; worth another attempt.
    #[error("transient lookup failure: {0}")]
    Transient(io::Error),

    /// The lookup failed for good (e.g. NXDOMAIN).
    #[error("{0}")]
    Failed(io::Error),
}

impl LookupError {
    /// Whether the lookup should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify an I/O error returned by the system resolver.
    pub fn from_io(err: io::Error) -> Self {
        let message = err.to_string().to_lowercase();
        let transient = matches!(
            err.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
        ) || message.contains("temporary failure")
            || message.contains("try again")
            || message.contains("timed out");

        if transient {
            Self::Transient(err)
        } else {
            Self::Failed(err)
        }
    }
}

/// DNS lookup capability.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve a hostname to its addresses, in the order the resolver returned them.
    async fn lookup_host(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupError>;
}

/// Resolver backed by the operating system (`getaddrinfo`, honouring `/etc/resolv.conf`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup_host(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupError> {
        let addrs = tokio::net::lookup_host((hostname, 0))
            .await
            .map_err(LookupError::from_io)?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            // getaddrinfo repeats each address once per socket type
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }

        if ips.is_empty() {
            return Err(LookupError::NoRecords);
        }
        Ok(ips)
    }
}

/// Hostname of the master with the given 1-based index.
pub fn master_hostname(datacenter: &str, cluster: &str, domain: &str, index: u32) -> String {
    format!("{datacenter}-{cluster}master-{index}.{domain}")
}

/// Resolved master addresses plus the trailing service IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterAddressList {
    /// Master addresses, index 1..=N in order.
    pub masters: Vec<IpAddr>,
    /// Cluster service IP appended after the masters.
    pub service_ip: String,
}

impl fmt::Display for MasterAddressList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ip in &self.masters {
            write!(f, "{ip},")?;
        }
        write!(f, "{}", self.service_ip)
    }
}

/// Resolves the expected master hostnames of a cluster.
pub struct AddressResolver<'a> {
    resolver: &'a dyn HostResolver,
    retry: RetryConfig,
}

impl<'a> AddressResolver<'a> {
    /// Create a resolver with the default DNS retry policy (5 attempts).
    pub fn new(resolver: &'a dyn HostResolver) -> Self {
        Self {
            resolver,
            retry: RetryConfig::dns(),
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve a single master, keeping the first address returned.
    async fn resolve_one(&self, hostname: &str) -> Result<IpAddr, BootstrapError> {
        debug!("Looking up host: {hostname}");

        let resolver = self.resolver;
        let addresses = with_retry_async(
            &self.retry,
            &format!("lookup {hostname}"),
            LookupError::is_transient,
            move || resolver.lookup_host(hostname),
        )
        .await
        .map_err(|e| BootstrapError::Resolution {
            host: hostname.to_string(),
            reason: e.to_string(),
        })?;

        addresses
            .first()
            .copied()
            .ok_or_else(|| BootstrapError::Resolution {
                host: hostname.to_string(),
                reason: LookupError::NoRecords.to_string(),
            })
    }

    /// Resolve masters `1..=count` in index order.
    ///
    /// Any single failure aborts the whole call; no partial list is returned.
    pub async fn resolve_master_list(
        &self,
        datacenter: &str,
        cluster: &str,
        domain: &str,
        count: u32,
        service_ip: &str,
    ) -> Result<MasterAddressList, BootstrapError> {
        let mut masters = Vec::new();
        for index in 1..=count {
            let hostname = master_hostname(datacenter, cluster, domain, index);
            masters.push(self.resolve_one(&hostname).await?);
        }

        let list = MasterAddressList {
            masters,
            service_ip: service_ip.to_string(),
        };
        info!("Resolved master addresses: {list}");
        Ok(list)
    }

    /// Resolve masters and return them comma-joined with the service IP last.
    pub async fn resolve_master_addresses(
        &self,
        datacenter: &str,
        cluster: &str,
        domain: &str,
        count: u32,
        service_ip: &str,
    ) -> Result<String, BootstrapError> {
        self.resolve_master_list(datacenter, cluster, domain, count, service_ip)
            .await
            .map(|list| list.to_string())
    }
}

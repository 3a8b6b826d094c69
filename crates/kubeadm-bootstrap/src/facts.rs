//! Local system facts: datacenter (via facter), hostname and outbound address.

use std::net::{IpAddr, UdpSocket};

use async_trait::async_trait;
use sysinfo::System;
use tokio::process::Command;
use tracing::debug;

use crate::error::BootstrapError;

/// Default facter executable.
pub const DEFAULT_FACTER: &str = "facter";

/// Public address used to pick the outbound interface. Nothing is sent to it.
const OUTBOUND_PROBE_ADDR: &str = "8.8.8.8:80";

/// Facts about the machine the tool runs on.
#[async_trait]
pub trait LocalFacts: Send + Sync {
    /// Datacenter name of this host. May be empty when the fact is unset.
    async fn datacenter(&self) -> Result<String, BootstrapError>;

    /// Operating system hostname.
    fn hostname(&self) -> Result<String, BootstrapError>;

    /// Preferred outbound IP of this machine.
    fn outbound_ip(&self) -> Result<IpAddr, BootstrapError>;
}

/// Facts read from the running system.
#[derive(Debug, Clone)]
pub struct SystemFacts {
    facter: String,
}

impl Default for SystemFacts {
    fn default() -> Self {
        Self::new(DEFAULT_FACTER)
    }
}

impl SystemFacts {
    /// Use the given facter executable.
    pub fn new(facter: impl Into<String>) -> Self {
        Self {
            facter: facter.into(),
        }
    }
}

#[async_trait]
impl LocalFacts for SystemFacts {
    async fn datacenter(&self) -> Result<String, BootstrapError> {
        debug!("Running {} -p datacenter", self.facter);
        let output = Command::new(&self.facter)
            .args(["-p", "datacenter"])
            .output()
            .await
            .map_err(|e| {
                BootstrapError::config(format!("Error detecting datacenter from facter: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BootstrapError::config(format!(
                "Error detecting datacenter from facter: {} {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .trim_end_matches('\n')
            .to_string())
    }

    fn hostname(&self) -> Result<String, BootstrapError> {
        System::host_name()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BootstrapError::config("Cannot detect hostname"))
    }

    fn outbound_ip(&self) -> Result<IpAddr, BootstrapError> {
        outbound_ip()
    }
}

/// Local address the kernel would route public traffic from.
///
/// Connecting a UDP socket only selects a route; no packet leaves the host.
pub fn outbound_ip() -> Result<IpAddr, BootstrapError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| BootstrapError::io("Error binding UDP socket", e))?;
    socket
        .connect(OUTBOUND_PROBE_ADDR)
        .map_err(|e| BootstrapError::io("Error detecting outbound IP", e))?;
    let addr = socket
        .local_addr()
        .map_err(|e| BootstrapError::io("Error reading local socket address", e))?;
    Ok(addr.ip())
}

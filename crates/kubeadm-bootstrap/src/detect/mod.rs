//! Environment detection.
//!
//! Decides once at startup whether the host runs on EC2 or not, then derives the
//! node hostname, domain and cloud provider tag from the matching source:
//!
//! - **Aws** - instance metadata (`local-hostname`, region)
//! - **Local** - the operating system hostname

mod aws;

use tracing::{info, warn};

pub use aws::{Ec2Metadata, InstanceIdentityDocument, DEFAULT_METADATA_ENDPOINT};

use crate::error::BootstrapError;
use crate::facts::LocalFacts;

/// Hostname, domain and provider tag of the current node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    /// Fully qualified node hostname.
    pub hostname: String,
    /// Domain derived from the hostname, if it has enough labels.
    pub domain: Option<String>,
    /// Cloud provider tag passed to kubeadm (`aws` or empty).
    pub cloud_provider: String,
}

/// Detection strategy, selected once by probing instance metadata.
#[derive(Debug, Clone)]
pub enum Provider {
    /// Running on EC2; facts come from instance metadata.
    Aws(Ec2Metadata),
    /// Anywhere else; facts come from the operating system.
    Local,
}

impl Provider {
    /// Pick `Aws` if the metadata service answers, otherwise `Local`.
    pub async fn select(metadata: Ec2Metadata) -> Self {
        if metadata.available().await {
            info!("Running in AWS");
            Self::Aws(metadata)
        } else {
            info!("Not running in AWS");
            Self::Local
        }
    }

    /// Cloud provider tag for this strategy.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Aws(_) => "aws",
            Self::Local => "",
        }
    }

    /// Detect the hostname, domain and provider tag.
    pub async fn detect(&self, facts: &dyn LocalFacts) -> Result<HostIdentity, BootstrapError> {
        match self {
            Self::Aws(metadata) => {
                let local_hostname = metadata.get_metadata("local-hostname").await?;
                let region = metadata.region().await?;
                Ok(aws_identity(local_hostname.trim(), &region))
            }
            Self::Local => {
                let hostname = facts.hostname()?;
                let domain = domain_from_hostname(&hostname);
                if domain.is_none() {
                    warn!("Cannot auto detect domainname from {hostname}");
                }
                Ok(HostIdentity {
                    hostname,
                    domain,
                    cloud_provider: self.tag().to_string(),
                })
            }
        }
    }
}

/// Build the EC2 identity: `{short}.{region}.compute.internal`, domain from the
/// metadata hostname's second and third labels.
fn aws_identity(local_hostname: &str, region: &str) -> HostIdentity {
    let short = local_hostname.split('.').next().unwrap_or(local_hostname);
    let domain = domain_from_hostname(local_hostname);
    if domain.is_none() {
        warn!("Cannot auto detect domainname from {local_hostname}");
    }

    HostIdentity {
        hostname: format!("{short}.{region}.compute.internal"),
        domain,
        cloud_provider: "aws".to_string(),
    }
}

/// Second and third labels of a hostname (`node.dc1.example.com` -> `dc1.example`).
///
/// Returns `None` when the hostname has fewer than three labels.
pub fn domain_from_hostname(hostname: &str) -> Option<String> {
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() < 3 || labels[1].is_empty() || labels[2].is_empty() {
        return None;
    }
    Some(format!("{}.{}", labels[1], labels[2]))
}

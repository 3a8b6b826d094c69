//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

/// Generate a kubeadm config for a kubernetes cluster using CIS compatible configuration.
///
/// Values that are not given on the command line are read from the environment
/// (`KUBEADM_BOOTSTRAP_*`), then from the config file, then auto-detected.
#[derive(Parser, Debug, Default)]
#[command(name = "kubeadm-bootstrap")]
#[command(version)]
#[command(about = "Bootstrap a kubernetes cluster using known good config")]
pub struct Cli {
    /// Config file (default is $HOME/.kubeadm-bootstrap.yaml).
    #[arg(long, value_name = "FILE", env = "KUBEADM_BOOTSTRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Nodename for bootstrap master.
    #[arg(short = 'n', long, env = "KUBEADM_BOOTSTRAP_NODENAME")]
    pub nodename: Option<String>,

    /// Datacenter name for cluster bootstrap.
    #[arg(short = 'd', long, env = "KUBEADM_BOOTSTRAP_DATACENTER")]
    pub datacenter: Option<String>,

    /// Cluster name for cluster bootstrap [default: k1].
    #[arg(short = 'c', long, env = "KUBEADM_BOOTSTRAP_CLUSTERNAME")]
    pub clustername: Option<String>,

    /// Domain name for nodes in cluster.
    #[arg(short = 'D', long, env = "KUBEADM_BOOTSTRAP_DOMAINNAME")]
    pub domainname: Option<String>,

    /// Path to kubeadm file to write [default: /etc/kubernetes/kubeadm.json].
    #[arg(short = 'f', long, value_name = "FILE", env = "KUBEADM_BOOTSTRAP_KUBEADMFILE")]
    pub kubeadmfile: Option<PathBuf>,

    /// Comma separated list of IPs for the cluster (skips DNS lookup).
    #[arg(short = 'a', long, env = "KUBEADM_BOOTSTRAP_ADDRESSLIST")]
    pub addresslist: Option<String>,

    /// Kubernetes service IP [default: 10.96.0.1].
    #[arg(short = 's', long, env = "KUBEADM_BOOTSTRAP_SVCIP")]
    pub svcip: Option<String>,

    /// Number of masters in the cluster [default: 3].
    #[arg(short = 'm', long = "number", env = "KUBEADM_BOOTSTRAP_NUMBER")]
    pub number: Option<u32>,

    /// Kubernetes bootstrap token (generated when omitted).
    #[arg(short = 't', long, env = "KUBEADM_BOOTSTRAP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Template file to render instead of the built-in kubeadm template.
    #[arg(long, value_name = "FILE", env = "KUBEADM_BOOTSTRAP_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Base URL of the EC2 instance metadata service.
    #[arg(long, value_name = "URL", env = "KUBEADM_BOOTSTRAP_METADATA_ENDPOINT")]
    pub metadata_endpoint: Option<String>,

    /// Output the kubeadm config to stdout instead of a file.
    #[arg(long = "dry-run", env = "KUBEADM_BOOTSTRAP_DRY_RUN")]
    pub dry_run: bool,

    /// Suppress logging output.
    #[arg(long, env = "KUBEADM_BOOTSTRAP_QUIET", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

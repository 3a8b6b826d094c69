//! Runtime configuration.
//!
//! Flags and `KUBEADM_BOOTSTRAP_*` variables win over the YAML config file,
//! which wins over the built-in defaults. The result is one [`BootstrapConfig`]
//! passed by reference through the pipeline.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::cli::Cli;
use crate::detect::DEFAULT_METADATA_ENDPOINT;
use crate::error::BootstrapError;
use crate::token::Token;

/// Default cluster name.
pub const DEFAULT_CLUSTER_NAME: &str = "k1";

/// Default output path.
pub const DEFAULT_KUBEADM_FILE: &str = "/etc/kubernetes/kubeadm.json";

/// Default kubernetes service IP.
pub const DEFAULT_SERVICE_IP: &str = "10.96.0.1";

/// Default number of masters.
pub const DEFAULT_MASTER_COUNT: u32 = 3;

/// Largest accepted number of masters.
pub const MAX_MASTER_COUNT: u32 = 255;

/// Config file looked up in the home directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".kubeadm-bootstrap.yaml";

/// Settings read from the YAML config file. Keys mirror the long flag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub nodename: Option<String>,
    pub datacenter: Option<String>,
    pub clustername: Option<String>,
    pub domainname: Option<String>,
    pub kubeadmfile: Option<PathBuf>,
    pub addresslist: Option<String>,
    pub svcip: Option<String>,
    pub number: Option<u32>,
    pub token: Option<String>,
    pub template: Option<PathBuf>,
    #[serde(alias = "metadata-endpoint")]
    pub metadata_endpoint: Option<String>,
    #[serde(alias = "dry-run")]
    pub dry_run: Option<bool>,
}

impl FileConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BootstrapError::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|e| {
            BootstrapError::config(format!("Failed to parse config file {}: {e}", path.display()))
        })
    }

    fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

/// Fully merged configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Config file that was read, if any.
    pub config_file: Option<PathBuf>,
    /// Explicit node name; detected when `None`.
    pub node_name: Option<String>,
    /// Explicit datacenter; read from facter when `None`.
    pub datacenter: Option<String>,
    /// Cluster name.
    pub cluster_name: String,
    /// Explicit domain; detected when `None`.
    pub domain_name: Option<String>,
    /// Where the rendered document is written.
    pub kubeadm_file: PathBuf,
    /// Explicit address list; resolved through DNS when `None`.
    pub address_list: Option<String>,
    /// Kubernetes service IP appended to the address list.
    pub service_ip: String,
    /// Number of masters in the cluster.
    pub number_masters: u32,
    /// Explicit bootstrap token; generated when `None`.
    pub token: Option<String>,
    /// Template file overriding the built-in template.
    pub template: Option<PathBuf>,
    /// Base URL of the EC2 instance metadata service.
    pub metadata_endpoint: String,
    /// Print the document instead of writing it.
    pub dry_run: bool,
    /// Logging disabled.
    pub quiet: bool,
    /// Debug logging enabled.
    pub verbose: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            node_name: None,
            datacenter: None,
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            domain_name: None,
            kubeadm_file: PathBuf::from(DEFAULT_KUBEADM_FILE),
            address_list: None,
            service_ip: DEFAULT_SERVICE_IP.to_string(),
            number_masters: DEFAULT_MASTER_COUNT,
            token: None,
            template: None,
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            dry_run: false,
            quiet: false,
            verbose: false,
        }
    }
}

/// Treat empty strings like unset values.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty())
}

impl BootstrapConfig {
    /// Build the configuration from parsed flags, reading the config file if any.
    ///
    /// An explicit `--config` must exist; the home-directory file is optional.
    pub fn load(cli: &Cli) -> Result<Self, BootstrapError> {
        let path = cli
            .config
            .clone()
            .or_else(|| default_config_path().filter(|p| p.is_file()));

        let Some(path) = path else {
            return Self::merge(cli, FileConfig::default());
        };

        info!("Using config file: {}", path.display());
        let file = FileConfig::load(&path)?;
        let mut config = Self::merge(cli, file)?;
        config.config_file = Some(path);
        Ok(config)
    }

    /// Merge flags over file settings over defaults.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, BootstrapError> {
        let defaults = Self::default();

        let config = Self {
            config_file: None,
            node_name: non_empty(cli.nodename.clone()).or(non_empty(file.nodename)),
            datacenter: non_empty(cli.datacenter.clone()).or(non_empty(file.datacenter)),
            cluster_name: non_empty(cli.clustername.clone())
                .or(non_empty(file.clustername))
                .unwrap_or(defaults.cluster_name),
            domain_name: non_empty(cli.domainname.clone()).or(non_empty(file.domainname)),
            kubeadm_file: non_empty_path(cli.kubeadmfile.clone())
                .or(non_empty_path(file.kubeadmfile))
                .unwrap_or(defaults.kubeadm_file),
            address_list: non_empty(cli.addresslist.clone()).or(non_empty(file.addresslist)),
            service_ip: non_empty(cli.svcip.clone())
                .or(non_empty(file.svcip))
                .unwrap_or(defaults.service_ip),
            number_masters: cli
                .number
                .or(file.number)
                .unwrap_or(defaults.number_masters),
            token: non_empty(cli.token.clone()).or(non_empty(file.token)),
            template: non_empty_path(cli.template.clone()).or(non_empty_path(file.template)),
            metadata_endpoint: non_empty(cli.metadata_endpoint.clone())
                .or(non_empty(file.metadata_endpoint))
                .unwrap_or(defaults.metadata_endpoint),
            dry_run: cli.dry_run || file.dry_run.unwrap_or(false),
            quiet: cli.quiet,
            verbose: cli.verbose,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never produce a usable document.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.cluster_name.trim().is_empty() {
            return Err(BootstrapError::config("Please specify a cluster name"));
        }
        if self.number_masters == 0 {
            return Err(BootstrapError::config(
                "Number of masters must be at least 1",
            ));
        }
        if self.number_masters > MAX_MASTER_COUNT {
            return Err(BootstrapError::config(format!(
                "Number of masters must be at most {MAX_MASTER_COUNT}"
            )));
        }
        if self.kubeadm_file.as_os_str().is_empty() && !self.dry_run {
            return Err(BootstrapError::config("Please specify a kubeadm file path"));
        }
        if let Some(token) = &self.token {
            token.parse::<Token>()?;
        }
        Ok(())
    }
}

/// `$HOME/.kubeadm-bootstrap.yaml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE_NAME))
}

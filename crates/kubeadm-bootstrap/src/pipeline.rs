//! The bootstrap pipeline: detect, resolve, generate, render, write.

use std::io::Write;

use tracing::info;

use crate::config::BootstrapConfig;
use crate::context::BootstrapContext;
use crate::detect::{Ec2Metadata, HostIdentity, Provider};
use crate::error::BootstrapError;
use crate::facts::LocalFacts;
use crate::output::{write_document, Outcome};
use crate::resolver::{AddressResolver, HostResolver};
use crate::retry::RetryConfig;
use crate::template::{load_template, TemplateRenderer};
use crate::token::{generate_token, Token};

/// External capabilities the pipeline depends on.
pub struct Environment<'a> {
    /// Local facts probe.
    pub facts: &'a dyn LocalFacts,
    /// DNS resolver for master hostnames.
    pub resolver: &'a dyn HostResolver,
    /// Retry policy for each master lookup.
    pub dns_retry: RetryConfig,
    /// Retry policy for EC2 metadata reads.
    pub metadata_retry: RetryConfig,
}

impl<'a> Environment<'a> {
    /// Use the given probes with the default retry policies.
    pub fn new(facts: &'a dyn LocalFacts, resolver: &'a dyn HostResolver) -> Self {
        Self {
            facts,
            resolver,
            dns_retry: RetryConfig::dns(),
            metadata_retry: RetryConfig::metadata(),
        }
    }
}

/// Collect every template variable, in pipeline order.
///
/// The configuration is validated first, so invalid input fails before any
/// facter, metadata or DNS call.
pub async fn build_context(
    config: &BootstrapConfig,
    env: &Environment<'_>,
) -> Result<BootstrapContext, BootstrapError> {
    config.validate()?;

    let datacenter = match &config.datacenter {
        Some(dc) => dc.clone(),
        None => env.facts.datacenter().await?,
    };
    if datacenter.trim().is_empty() {
        return Err(BootstrapError::config(
            "Please specify a datacenter (facter returned no datacenter fact)",
        ));
    }
    info!("Datacenter: {datacenter}");

    let identity = detect_identity(config, env).await?;

    let node_name = config
        .node_name
        .clone()
        .unwrap_or_else(|| identity.hostname.clone());
    if node_name.trim().is_empty() {
        return Err(BootstrapError::config("Please specify a nodename"));
    }

    let domain_name = config
        .domain_name
        .clone()
        .or_else(|| identity.domain.clone())
        .ok_or_else(|| BootstrapError::config("Please specify a domainname"))?;
    info!("Node {node_name} in domain {domain_name}");

    let address_list = match &config.address_list {
        Some(list) => list.clone(),
        None => {
            AddressResolver::new(env.resolver)
                .with_retry(env.dns_retry.clone())
                .resolve_master_addresses(
                    &datacenter,
                    &config.cluster_name,
                    &domain_name,
                    config.number_masters,
                    &config.service_ip,
                )
                .await?
        }
    };

    let ip_address = env.facts.outbound_ip()?;

    let token = match &config.token {
        Some(token) => token.parse::<Token>()?,
        None => generate_token()?,
    };

    Ok(BootstrapContext {
        datacenter,
        cluster_name: config.cluster_name.clone(),
        domain_name,
        node_name,
        cloud_provider: identity.cloud_provider,
        ip_address: ip_address.to_string(),
        address_list,
        token: token.to_string(),
        number_masters: config.number_masters,
    })
}

async fn detect_identity(
    config: &BootstrapConfig,
    env: &Environment<'_>,
) -> Result<HostIdentity, BootstrapError> {
    let metadata =
        Ec2Metadata::new(&config.metadata_endpoint)?.with_retry(env.metadata_retry.clone());
    let provider = Provider::select(metadata).await;
    provider.detect(env.facts).await
}

/// Render the kubeadm document for a collected context.
pub fn render_context(
    config: &BootstrapConfig,
    context: &BootstrapContext,
) -> Result<String, BootstrapError> {
    let template = load_template(config.template.as_deref())?;
    TemplateRenderer::new().render(&template, &context.variables())
}

/// Run the whole pipeline, printing to `stdout` on dry-run.
pub async fn run<W: Write>(
    config: &BootstrapConfig,
    env: &Environment<'_>,
    stdout: &mut W,
) -> Result<Outcome, BootstrapError> {
    let context = build_context(config, env).await?;
    let document = render_context(config, &context)?;
    write_document(&document, &config.kubeadm_file, config.dry_run, stdout)
}

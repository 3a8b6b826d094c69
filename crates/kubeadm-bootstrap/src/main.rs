//! kubeadm-bootstrap CLI.
//!
//! Detects the local environment, resolves the cluster masters and writes a
//! kubeadm master configuration.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use kubeadm_bootstrap::{pipeline, BootstrapConfig, Cli, Environment, SystemFacts, SystemResolver};

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        let default = if cli.verbose { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let config = BootstrapConfig::load(cli).context("Failed to load configuration")?;

    let facts = SystemFacts::default();
    let resolver = SystemResolver;
    let env = Environment::new(&facts, &resolver);

    let mut stdout = std::io::stdout().lock();
    pipeline::run(&config, &env, &mut stdout)
        .await
        .context("Failed to bootstrap kubeadm config")?;
    Ok(())
}

/// Report a fatal error exactly once: through the log, or on `stderr` when
/// logging is off.
fn report_failure<W: Write>(err: &anyhow::Error, quiet: bool, stderr: &mut W) {
    if quiet {
        let _ = writeln!(stderr, "Error: {err:#}");
    } else {
        error!("{err:#}");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(&cli).await {
        report_failure(&err, cli.quiet, &mut std::io::stderr());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> anyhow::Error {
        anyhow::anyhow!("Error resolving hostname dc1-k1master-1.example.com")
            .context("Failed to bootstrap kubeadm config")
    }

    #[test]
    fn test_quiet_failure_is_printed_once() {
        let mut stderr = Vec::new();
        report_failure(&failure(), true, &mut stderr);

        let out = String::from_utf8(stderr).unwrap();
        assert_eq!(
            out,
            "Error: Failed to bootstrap kubeadm config: Error resolving hostname dc1-k1master-1.example.com\n"
        );
    }

    #[test]
    fn test_logged_failure_is_not_printed_again() {
        let mut stderr = Vec::new();
        report_failure(&failure(), false, &mut stderr);
        assert!(stderr.is_empty());
    }
}

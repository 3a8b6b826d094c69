//! Generate a kubeadm master configuration for a bare-metal or EC2 cluster.
//!
//! The bootstrap runs as a fixed sequence of stages:
//!
//! 1. detect the datacenter, hostname, domain and cloud provider
//! 2. resolve the master hostnames `{dc}-{cluster}master-{i}.{domain}` in order
//! 3. generate a bootstrap token
//! 4. render the kubeadm `MasterConfiguration` template
//! 5. write the document to disk, or print it on dry-run
//!
//! # Example
//!
//! ```rust,ignore
//! use kubeadm_bootstrap::{pipeline, BootstrapConfig, Environment, SystemFacts, SystemResolver};
//!
//! let facts = SystemFacts::default();
//! let env = Environment::new(&facts, &SystemResolver);
//! pipeline::run(&config, &env, &mut std::io::stdout()).await?;
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod context;
pub mod detect;
pub mod error;
pub mod facts;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod template;
pub mod token;

pub use cli::Cli;
pub use config::BootstrapConfig;
pub use context::BootstrapContext;
pub use detect::{Ec2Metadata, HostIdentity, Provider};
pub use error::BootstrapError;
pub use facts::{LocalFacts, SystemFacts};
pub use output::Outcome;
pub use pipeline::Environment;
pub use resolver::{AddressResolver, HostResolver, LookupError, SystemResolver};
pub use token::{generate_token, Token};

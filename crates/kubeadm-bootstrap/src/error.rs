//! Error types for the bootstrap pipeline.

use thiserror::Error;

/// Errors that can occur while generating a kubeadm configuration.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// A required value is missing and could not be detected, or an input is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A master hostname could not be resolved.
    #[error("Error resolving hostname {host}: {reason}")]
    Resolution { host: String, reason: String },

    /// The secure random source failed.
    #[error("Secure random source failed: {0}")]
    RandomSource(#[from] rand::Error),

    /// EC2 metadata request failed at the transport level.
    #[error("EC2 metadata request failed: {0}")]
    MetadataHttp(#[from] reqwest::Error),

    /// EC2 metadata service answered with a non-success status.
    #[error("EC2 metadata returned {status} for {path}")]
    MetadataStatus { path: String, status: u16 },

    /// EC2 metadata response could not be interpreted.
    #[error("EC2 metadata error: {0}")]
    Metadata(String),

    /// Template parsing or rendering failed.
    #[error("Template error: {0}")]
    Template(String),

    /// Filesystem or socket operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BootstrapError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<handlebars::RenderError> for BootstrapError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template(err.to_string())
    }
}

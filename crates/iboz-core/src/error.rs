//! Error types for the core library.

use thiserror::Error;

use crate::context::Cancellation;
use crate::provider::{ConfigError, CredentialError};

/// Boxed error raised inside a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Collaborator that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Storage of configuration, authentication and messages.
    Repository,
    /// Credential secret hashing.
    SecretHasher,
    /// Message retrieval.
    MessageGenerator,
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Repository => "repository",
            Self::SecretHasher => "secret hasher",
            Self::MessageGenerator => "message generator",
        };
        f.write_str(name)
    }
}

/// Errors reported by collaborator ports.
#[derive(Debug, Error)]
pub enum PortError {
    /// The call observed a cancelled or expired context.
    #[error(transparent)]
    Cancelled(#[from] Cancellation),

    /// The collaborator failed internally.
    #[error(transparent)]
    Failure(BoxError),
}

impl PortError {
    /// Wraps an arbitrary collaborator failure.
    pub fn failure(error: impl Into<BoxError>) -> Self {
        Self::Failure(error.into())
    }
}

/// Result type for port operations.
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Errors that can occur in provider lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No provider configuration is stored.
    #[error("email provider not configured")]
    NotConfigured,

    /// No authentication record is stored.
    #[error("email provider authentication not configured")]
    NotAuthenticated,

    /// The candidate configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The requested auth method is not supported.
    #[error("unsupported auth method {0:?}")]
    UnsupportedMethod(String),

    /// A credential field was missing.
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] CredentialError),

    /// The credential secret is too short.
    #[error("credential secret must be at least {min_len} characters")]
    WeakCredential {
        /// Minimum accepted secret length in characters.
        min_len: usize,
    },

    /// The caller's context was cancelled or expired.
    #[error(transparent)]
    Cancelled(#[from] Cancellation),

    /// A collaborator failed.
    #[error("{port} failure: {source}")]
    Collaborator {
        /// Collaborator that failed.
        port: Port,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Converts a port error raised by `port` into a service error.
    #[must_use]
    pub fn from_port(port: Port, error: PortError) -> Self {
        match error {
            PortError::Cancelled(reason) => Self::Cancelled(reason),
            PortError::Failure(source) => Self::Collaborator { port, source },
        }
    }

    /// Returns `true` for errors caused by the request itself rather than by
    /// lifecycle order, cancellation or a collaborator.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::UnsupportedMethod(_)
                | Self::InvalidCredential(_)
                | Self::WeakCredential { .. }
        )
    }

    /// Returns `true` when a lifecycle pre-condition was not met.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::NotAuthenticated)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

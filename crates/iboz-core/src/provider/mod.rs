//! Provider domain: data model, validation, secret handling and the
//! lifecycle service.

mod model;
mod secret;
mod service;
mod validation;

pub use model::{
    AuthMethod, AuthRecord, AuthRequest, AuthState, AuthStatus, ConnectionRequest,
    ConnectionSettings, EmailMessage, Importance, MessageBatch, Protocol, Provider, ProviderConfig,
    ProviderConfigRequest, ServiceState, Stage,
};
pub use secret::{RawSecret, SecretHash, SecretHasher, Sha256Hasher};
pub use service::ProviderService;
pub use validation::{
    ConfigError, CredentialError, DEFAULT_IMAP_PORT, DEFAULT_SYNC_WINDOW_HOURS, MIN_SECRET_LEN,
    ValidatedConfig, validate_config, validate_credentials,
};

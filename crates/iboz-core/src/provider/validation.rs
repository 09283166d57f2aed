//! Configuration and credential validation.
//!
//! Validation reports the first failing rule, in a fixed order, and never
//! touches the caller's request. Normalization is only reachable through a
//! successfully validated request.

use super::model::{
    AuthMethod, AuthRequest, ConnectionSettings, Protocol, Provider, ProviderConfig,
    ProviderConfigRequest,
};
use crate::Error;

/// Sync window applied when the request leaves it at 0.
pub const DEFAULT_SYNC_WINDOW_HOURS: u32 = 24;

/// IMAP port applied when the request leaves it at 0.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Minimum credential secret length, in characters.
pub const MIN_SECRET_LEN: usize = 8;

/// Validation error for provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Provider is empty.
    MissingProvider,
    /// Provider is not one of the supported identifiers.
    UnsupportedProvider(String),
    /// Display name is empty.
    EmptyDisplayName,
    /// Connection protocol is not one of the supported identifiers.
    UnsupportedProtocol(String),
    /// IMAP host is empty.
    EmptyImapHost,
    /// IMAP port is not positive.
    InvalidImapPort,
    /// Port does not fit a TCP port number.
    PortOutOfRange(i32),
    /// Sync window is negative.
    NegativeSyncWindow,
}

impl ConfigError {
    /// Get the request field this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingProvider | Self::UnsupportedProvider(_) => "provider",
            Self::EmptyDisplayName => "displayName",
            Self::UnsupportedProtocol(_) => "connection.protocol",
            Self::EmptyImapHost => "connection.host",
            Self::InvalidImapPort | Self::PortOutOfRange(_) => "connection.port",
            Self::NegativeSyncWindow => "syncWindowHours",
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingProvider => f.write_str("provider is required"),
            Self::UnsupportedProvider(value) => write!(f, "unsupported provider {value:?}"),
            Self::EmptyDisplayName => f.write_str("display name is required"),
            Self::UnsupportedProtocol(value) => {
                write!(f, "unsupported connection protocol {value:?}")
            }
            Self::EmptyImapHost => f.write_str("imap host is required"),
            Self::InvalidImapPort => f.write_str("imap port must be greater than zero"),
            Self::PortOutOfRange(port) => write!(f, "port {port} must be 0-65535"),
            Self::NegativeSyncWindow => f.write_str("sync window cannot be negative"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validation error for credential fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Username is empty.
    EmptyUsername,
    /// Secret is empty.
    EmptySecret,
}

impl CredentialError {
    /// Get the request field this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyUsername => "username",
            Self::EmptySecret => "secret",
        }
    }
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUsername => f.write_str("username is required"),
            Self::EmptySecret => f.write_str("credential secret is required"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// A configuration request that passed validation.
#[derive(Debug)]
pub struct ValidatedConfig<'a> {
    request: &'a ProviderConfigRequest,
    provider: Provider,
    protocol: Protocol,
    port: u16,
    sync_window_hours: u32,
}

/// Validate a configuration request.
///
/// # Errors
///
/// Returns the first failing rule, checked in this order: provider, display
/// name, protocol, IMAP host and port, port range, sync window.
pub fn validate_config(request: &ProviderConfigRequest) -> Result<ValidatedConfig<'_>, ConfigError> {
    if request.provider.trim().is_empty() {
        return Err(ConfigError::MissingProvider);
    }
    let provider = Provider::parse(&request.provider)
        .ok_or_else(|| ConfigError::UnsupportedProvider(request.provider.clone()))?;

    if request.display_name.trim().is_empty() {
        return Err(ConfigError::EmptyDisplayName);
    }

    let connection = &request.connection;
    let protocol = Protocol::parse(&connection.protocol)
        .ok_or_else(|| ConfigError::UnsupportedProtocol(connection.protocol.clone()))?;

    if protocol == Protocol::Imap {
        if connection.host.trim().is_empty() {
            return Err(ConfigError::EmptyImapHost);
        }
        if connection.port <= 0 {
            return Err(ConfigError::InvalidImapPort);
        }
    }
    let port = u16::try_from(connection.port)
        .map_err(|_| ConfigError::PortOutOfRange(connection.port))?;

    let sync_window_hours =
        u32::try_from(request.sync_window_hours).map_err(|_| ConfigError::NegativeSyncWindow)?;

    Ok(ValidatedConfig {
        request,
        provider,
        protocol,
        port,
        sync_window_hours,
    })
}

impl ValidatedConfig<'_> {
    /// Produce the normalized configuration.
    ///
    /// Trims text fields, drops blank label filters, and applies the default
    /// sync window and IMAP port.
    #[must_use]
    pub fn normalize(self) -> ProviderConfig {
        let connection = &self.request.connection;

        let sync_window_hours = if self.sync_window_hours == 0 {
            DEFAULT_SYNC_WINDOW_HOURS
        } else {
            self.sync_window_hours
        };

        let port = match (self.protocol, self.port) {
            (Protocol::Imap, 0) => Some(DEFAULT_IMAP_PORT),
            (_, 0) => None,
            (_, port) => Some(port),
        };

        let label_filters = self
            .request
            .label_filters
            .iter()
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();

        ProviderConfig {
            provider: self.provider,
            display_name: self.request.display_name.trim().to_string(),
            connection: ConnectionSettings {
                protocol: self.protocol,
                host: non_blank(&connection.host),
                port,
                use_tls: connection.use_tls,
                api_base_url: non_blank(&connection.api_base_url),
            },
            sync_window_hours,
            label_filters,
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Validate credentials, returning the parsed method.
///
/// # Errors
///
/// Checked in order: [`Error::UnsupportedMethod`], [`Error::InvalidCredential`]
/// for a blank username then a blank secret, [`Error::WeakCredential`].
pub fn validate_credentials(request: &AuthRequest) -> Result<AuthMethod, Error> {
    let method = AuthMethod::parse(&request.method)
        .ok_or_else(|| Error::UnsupportedMethod(request.method.clone()))?;

    if request.username.trim().is_empty() {
        return Err(CredentialError::EmptyUsername.into());
    }
    if request.secret.is_blank() {
        return Err(CredentialError::EmptySecret.into());
    }
    if request.secret.char_len() < MIN_SECRET_LEN {
        return Err(Error::WeakCredential {
            min_len: MIN_SECRET_LEN,
        });
    }

    Ok(method)
}

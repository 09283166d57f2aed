//! Provider integration model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::secret::{RawSecret, SecretHash};

/// Supported email providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gmail.
    Gmail,
    /// Microsoft Outlook / Office 365.
    Outlook,
    /// Any IMAP server.
    Imap,
}

impl Provider {
    /// All supported providers.
    pub const ALL: [Self; 3] = [Self::Gmail, Self::Outlook, Self::Imap];

    /// Identifier used in requests and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
            Self::Imap => "imap",
        }
    }

    /// Parses an identifier, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport used to reach the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Provider HTTP API.
    Api,
    /// IMAP.
    Imap,
}

impl Protocol {
    /// All supported protocols.
    pub const ALL: [Self; 2] = [Self::Api, Self::Imap];

    /// Identifier used in requests and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Imap => "imap",
        }
    }

    /// Parses an identifier, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings as submitted by a caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionRequest {
    /// Protocol identifier (`api` or `imap`).
    pub protocol: String,
    /// Server hostname.
    pub host: String,
    /// Server port; 0 means unspecified.
    pub port: i32,
    /// Whether to connect with TLS.
    pub use_tls: bool,
    /// Base URL for API access.
    #[serde(rename = "apiBaseUrl")]
    pub api_base_url: String,
}

/// Provider configuration as submitted by a caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfigRequest {
    /// Provider identifier (`gmail`, `outlook` or `imap`).
    pub provider: String,
    /// Human readable integration name.
    pub display_name: String,
    /// Connection settings.
    pub connection: ConnectionRequest,
    /// Sync window in hours; 0 selects the default.
    pub sync_window_hours: i32,
    /// Labels to restrict syncing to.
    pub label_filters: Vec<String>,
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    /// Transport protocol.
    pub protocol: Protocol,
    /// Server hostname (always present for IMAP).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Server port (always present for IMAP).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Whether to connect with TLS.
    #[serde(default)]
    pub use_tls: bool,
    /// Base URL for API access.
    #[serde(
        default,
        rename = "apiBaseUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_base_url: Option<String>,
}

/// Validated, normalized provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider.
    pub provider: Provider,
    /// Trimmed, non-empty display name.
    pub display_name: String,
    /// Connection settings.
    pub connection: ConnectionSettings,
    /// Sync window in hours, never 0.
    pub sync_window_hours: u32,
    /// Trimmed, non-empty label filters in submission order.
    #[serde(default)]
    pub label_filters: Vec<String>,
}

/// Supported credential flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMethod {
    /// `OAuth2` access token.
    #[serde(rename = "oauth")]
    OAuth,
    /// Provider-issued application password.
    #[serde(rename = "appPassword")]
    AppPassword,
}

impl AuthMethod {
    /// Identifier used in requests and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OAuth => "oauth",
            Self::AppPassword => "appPassword",
        }
    }

    /// Parses an identifier. Matching is exact.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "oauth" => Some(Self::OAuth),
            "appPassword" => Some(Self::AppPassword),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection status of an authentication record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// Credentials were accepted.
    #[default]
    Connected,
}

impl AuthStatus {
    /// Identifier used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
        }
    }
}

/// Credentials submitted for authentication.
///
/// The secret is consumed by hashing and never leaves the service.
#[derive(Debug)]
pub struct AuthRequest {
    /// Method identifier (`oauth` or `appPassword`).
    pub method: String,
    /// Account username.
    pub username: String,
    /// Raw credential secret.
    pub secret: RawSecret,
}

impl AuthRequest {
    /// Builds a request from its parts.
    pub fn new(
        method: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<RawSecret>,
    ) -> Self {
        Self {
            method: method.into(),
            username: username.into(),
            secret: secret.into(),
        }
    }
}

/// Non-secret authentication metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Credential flow used.
    pub method: AuthMethod,
    /// Account username.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Connection status.
    pub status: AuthStatus,
    /// When the record was written.
    pub updated_at: DateTime<Utc>,
}

/// Persisted authentication outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord {
    /// Non-secret metadata.
    pub state: AuthState,
    /// Digest of the credential secret.
    pub secret_hash: SecretHash,
}

/// Message importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Needs attention.
    High,
    /// Everything else.
    #[default]
    Normal,
}

impl Importance {
    /// Identifier used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
        }
    }

    /// Parses a stored identifier; unknown values map to `Normal`.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        if value == "high" { Self::High } else { Self::Normal }
    }
}

/// A message retrieved from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    /// Provider message identifier.
    pub id: String,
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub sender: String,
    /// When the message arrived.
    pub received_at: DateTime<Utc>,
    /// Preview of the body.
    pub snippet: String,
    /// Labels attached to the message.
    pub labels: Vec<String>,
    /// Importance.
    pub importance: Importance,
}

/// Messages retrieved by one sync, with the sync instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBatch {
    /// Retrieved messages.
    pub messages: Vec<EmailMessage>,
    /// When the sync happened.
    pub synced_at: DateTime<Utc>,
}

/// Read-only snapshot of the integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    /// Current configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ProviderConfig>,
    /// Current authentication metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthState>,
    /// Instant of the last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Number of cached messages.
    pub messages_fetched: usize,
}

impl ServiceState {
    /// Lifecycle stage implied by the snapshot.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match (&self.config, &self.auth, self.last_sync) {
            (None, _, _) => Stage::Unconfigured,
            (Some(_), None, _) => Stage::Configured,
            (Some(_), Some(_), None) => Stage::Authenticated,
            (Some(_), Some(_), Some(_)) => Stage::Synced,
        }
    }
}

/// Lifecycle stage of the integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// No configuration stored.
    Unconfigured,
    /// Configured, not authenticated.
    Configured,
    /// Authenticated, never synced.
    Authenticated,
    /// At least one sync stored.
    Synced,
}

//! Provider lifecycle service.
//!
//! Drives configure → authenticate → fetch and composes snapshots. All state
//! lives in the [`Repository`]; the service only orchestrates its ports.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{
    AuthRecord, AuthRequest, AuthState, AuthStatus, EmailMessage, MessageBatch, ProviderConfig,
    ProviderConfigRequest, ServiceState,
};
use super::secret::{SecretHasher, Sha256Hasher};
use super::validation::{validate_config, validate_credentials};
use crate::context::Context;
use crate::error::{Error, Port, PortError, Result};
use crate::generator::{MessageGenerator, SyntheticGenerator};
use crate::storage::Repository;
use crate::time::{Clock, SystemClock};

fn repository_error(error: PortError) -> Error {
    Error::from_port(Port::Repository, error)
}

/// Manages provider configuration, authentication and message retrieval for
/// one integration.
///
/// Mutating operations are mutually exclusive with each other and with
/// [`ProviderService::state`]; snapshots may run concurrently.
pub struct ProviderService {
    repository: Arc<dyn Repository>,
    hasher: Arc<dyn SecretHasher>,
    generator: Arc<dyn MessageGenerator>,
    clock: Arc<dyn Clock>,
    gate: RwLock<()>,
}

impl std::fmt::Debug for ProviderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderService").finish_non_exhaustive()
    }
}

impl ProviderService {
    /// Creates a service over the given ports.
    #[must_use]
    pub fn new(
        repository: Arc<dyn Repository>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn MessageGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            hasher,
            generator,
            clock,
            gate: RwLock::new(()),
        }
    }

    /// Creates a service over `repository` with SHA-256 hashing, synthetic
    /// messages and the system clock.
    #[must_use]
    pub fn with_defaults(repository: Arc<dyn Repository>) -> Self {
        Self::new(
            repository,
            Arc::new(Sha256Hasher),
            Arc::new(SyntheticGenerator::new()),
            Arc::new(SystemClock),
        )
    }

    /// Validates, normalizes and stores a provider configuration.
    ///
    /// Any stored authentication record and message batch are discarded,
    /// even when the new configuration equals the previous one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] naming the first invalid field, before
    /// anything is written. [`Error::Cancelled`] or [`Error::Collaborator`]
    /// from the repository.
    pub async fn configure_provider(
        &self,
        ctx: &Context,
        request: &ProviderConfigRequest,
    ) -> Result<()> {
        let config = match validate_config(request) {
            Ok(validated) => validated.normalize(),
            Err(err) => {
                warn!(field = err.field(), "Rejected provider configuration: {err}");
                return Err(err.into());
            }
        };

        let _guard = ctx.run(self.gate.write()).await?;
        ctx.check()?;

        self.repository
            .replace_config(ctx, &config)
            .await
            .map_err(repository_error)?;

        info!(
            provider = %config.provider,
            protocol = %config.connection.protocol,
            labels = config.label_filters.len(),
            "Provider configured"
        );
        Ok(())
    }

    /// Validates credentials and stores the authentication record.
    ///
    /// The raw secret is consumed by the hasher; only its digest is stored.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`] when no configuration is stored, then
    /// [`Error::UnsupportedMethod`], [`Error::InvalidCredential`] or
    /// [`Error::WeakCredential`]. [`Error::Cancelled`] or
    /// [`Error::Collaborator`] from the ports.
    pub async fn authenticate(&self, ctx: &Context, request: AuthRequest) -> Result<AuthState> {
        let _guard = ctx.run(self.gate.write()).await?;

        let configured = self
            .repository
            .config(ctx)
            .await
            .map_err(repository_error)?
            .is_some();
        if !configured {
            return Err(Error::NotConfigured);
        }

        let method = validate_credentials(&request).inspect_err(|err| {
            warn!(method = %request.method, "Rejected credentials: {err}");
        })?;

        let AuthRequest {
            username, secret, ..
        } = request;

        let state = AuthState {
            method,
            username,
            status: AuthStatus::Connected,
            updated_at: self.clock.now(),
        };
        let secret_hash = self
            .hasher
            .hash(secret)
            .map_err(|err| Error::from_port(Port::SecretHasher, err))?;

        ctx.check()?;
        let record = AuthRecord {
            state,
            secret_hash,
        };
        self.repository
            .save_auth(ctx, &record)
            .await
            .map_err(repository_error)?;

        info!(
            method = %record.state.method,
            username = %record.state.username,
            "Provider authenticated"
        );
        Ok(record.state)
    }

    /// Retrieves a fresh message batch and stores it with the sync instant.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`], then [`Error::NotAuthenticated`].
    /// [`Error::Cancelled`] or [`Error::Collaborator`] from the ports.
    pub async fn fetch_emails(&self, ctx: &Context) -> Result<Vec<EmailMessage>> {
        let _guard = ctx.run(self.gate.write()).await?;

        let config = self
            .repository
            .config(ctx)
            .await
            .map_err(repository_error)?
            .ok_or(Error::NotConfigured)?;
        let auth = self
            .repository
            .auth(ctx)
            .await
            .map_err(repository_error)?
            .ok_or(Error::NotAuthenticated)?;

        let now = self.clock.now();
        let messages = self
            .generator
            .generate(ctx, &config, &auth.state, now)
            .await
            .map_err(|err| Error::from_port(Port::MessageGenerator, err))?;
        debug!(count = messages.len(), "Generated message batch");

        ctx.check()?;
        let batch = MessageBatch {
            messages,
            synced_at: now,
        };
        self.repository
            .save_messages(ctx, &batch)
            .await
            .map_err(repository_error)?;

        info!(
            provider = %config.provider,
            count = batch.messages.len(),
            synced_at = %batch.synced_at,
            "Messages synced"
        );
        Ok(batch.messages)
    }

    /// Returns a snapshot of configuration, authentication and sync status.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] or [`Error::Collaborator`] from the repository.
    pub async fn state(&self, ctx: &Context) -> Result<ServiceState> {
        let _guard = ctx.run(self.gate.read()).await?;

        let config = self.repository.config(ctx).await.map_err(repository_error)?;
        let auth = self.repository.auth(ctx).await.map_err(repository_error)?;
        let batch = self
            .repository
            .messages(ctx)
            .await
            .map_err(repository_error)?;

        Ok(compose_state(config, auth, batch))
    }
}

fn compose_state(
    config: Option<ProviderConfig>,
    auth: Option<AuthRecord>,
    batch: Option<MessageBatch>,
) -> ServiceState {
    let (last_sync, messages_fetched) = match batch {
        Some(batch) => (Some(batch.synced_at), batch.messages.len()),
        None => (None, 0),
    };
    ServiceState {
        config,
        auth: auth.map(|record| record.state),
        last_sync,
        messages_fetched,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::error::PortResult;
    use crate::provider::{
        AuthMethod, ConfigError, ConnectionRequest, CredentialError, Protocol, Provider, RawSecret,
        SecretHash, Stage,
    };
    use crate::storage::MemoryRepository;
    use crate::time::MockClock;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
    }

    fn gmail() -> ProviderConfigRequest {
        ProviderConfigRequest {
            provider: "gmail".to_string(),
            display_name: "Ops".to_string(),
            connection: ConnectionRequest {
                protocol: "api".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn imap() -> ProviderConfigRequest {
        ProviderConfigRequest {
            provider: "IMAP".to_string(),
            display_name: " Ops Mail ".to_string(),
            connection: ConnectionRequest {
                protocol: "imap".to_string(),
                host: " imap.ops.local ".to_string(),
                port: 993,
                use_tls: true,
                ..Default::default()
            },
            sync_window_hours: 48,
            label_filters: vec!["Urgent".to_string(), "Vendors".to_string()],
        }
    }

    fn creds(secret: &str) -> AuthRequest {
        AuthRequest::new("appPassword", "ops@example.com", secret)
    }

    struct Fixture {
        service: ProviderService,
        repository: Arc<MemoryRepository>,
        clock: Arc<MockClock>,
    }

    fn fixture() -> Fixture {
        let repository = Arc::new(MemoryRepository::new());
        let clock = MockClock::shared(start());
        let service = ProviderService::new(
            repository.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(SyntheticGenerator::new()),
            clock.clone(),
        );
        Fixture {
            service,
            repository,
            clock,
        }
    }

    /// Hasher that records what it was asked to hash.
    #[derive(Default)]
    struct RecordingHasher {
        calls: AtomicUsize,
    }

    impl SecretHasher for RecordingHasher {
        fn hash(&self, secret: RawSecret) -> PortResult<SecretHash> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Sha256Hasher.hash(secret)
        }
    }

    struct FailingHasher;

    impl SecretHasher for FailingHasher {
        fn hash(&self, _secret: RawSecret) -> PortResult<SecretHash> {
            Err(PortError::failure("entropy pool exhausted"))
        }
    }

    /// Generator that records its arguments.
    #[derive(Default)]
    struct CapturingGenerator {
        seen: Mutex<Option<(ProviderConfig, AuthState, DateTime<Utc>)>>,
    }

    #[async_trait]
    impl MessageGenerator for CapturingGenerator {
        async fn generate(
            &self,
            ctx: &Context,
            config: &ProviderConfig,
            auth: &AuthState,
            now: DateTime<Utc>,
        ) -> PortResult<Vec<EmailMessage>> {
            *self.seen.lock().unwrap() = Some((config.clone(), auth.clone(), now));
            SyntheticGenerator.generate(ctx, config, auth, now).await
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl MessageGenerator for FailingGenerator {
        async fn generate(
            &self,
            _ctx: &Context,
            _config: &ProviderConfig,
            _auth: &AuthState,
            _now: DateTime<Utc>,
        ) -> PortResult<Vec<EmailMessage>> {
            Err(PortError::failure("upstream unavailable"))
        }
    }

    #[tokio::test]
    async fn state_before_configuration_is_empty() {
        let f = fixture();
        let state = f.service.state(&Context::new()).await.unwrap();
        assert_eq!(state, ServiceState::default());
        assert_eq!(state.stage(), Stage::Unconfigured);
    }

    #[tokio::test]
    async fn configure_normalizes_and_defaults_sync_window() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();

        let state = f.service.state(&ctx).await.unwrap();
        let config = state.config.unwrap();
        assert_eq!(config.provider, Provider::Gmail);
        assert_eq!(config.sync_window_hours, 24);
        assert!(state.auth.is_none());
        assert_eq!(state.messages_fetched, 0);
    }

    #[tokio::test]
    async fn configure_imap_trims_fields() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &imap()).await.unwrap();

        let config = f.service.state(&ctx).await.unwrap().config.unwrap();
        assert_eq!(config.provider, Provider::Imap);
        assert_eq!(config.display_name, "Ops Mail");
        assert_eq!(config.connection.protocol, Protocol::Imap);
        assert_eq!(config.connection.host.as_deref(), Some("imap.ops.local"));
        assert_eq!(config.connection.port, Some(993));
        assert_eq!(config.sync_window_hours, 48);
    }

    #[tokio::test]
    async fn invalid_configuration_leaves_state_unchanged() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();
        f.service.authenticate(&ctx, creds("longenough")).await.unwrap();
        let before = f.service.state(&ctx).await.unwrap();

        let mut bad = imap();
        bad.connection.host = String::new();
        let err = f.service.configure_provider(&ctx, &bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ConfigError::EmptyImapHost)));

        let mut bad = gmail();
        bad.provider = "aol".to_string();
        let err = f.service.configure_provider(&ctx, &bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ConfigError::UnsupportedProvider(_))));

        assert_eq!(f.service.state(&ctx).await.unwrap(), before);
    }

    #[tokio::test]
    async fn authenticate_requires_configuration() {
        let f = fixture();
        let err = f
            .service
            .authenticate(&Context::new(), creds("longenough"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
    }

    #[tokio::test]
    async fn authenticate_checks_configuration_before_credentials() {
        let f = fixture();
        let err = f
            .service
            .authenticate(&Context::new(), AuthRequest::new("", "", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
    }

    #[tokio::test]
    async fn authenticate_validation_errors() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();

        let err = f
            .service
            .authenticate(&ctx, AuthRequest::new("kerberos", "ops", "longenough"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(_)));

        let err = f
            .service
            .authenticate(&ctx, AuthRequest::new("oauth", "", "abcdefghi"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidCredential(CredentialError::EmptyUsername)
        ));

        let err = f
            .service
            .authenticate(&ctx, AuthRequest::new("oauth", "ops@example.com", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WeakCredential { min_len: 8 }));
    }

    #[tokio::test]
    async fn weak_secret_keeps_existing_record() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();
        f.service.authenticate(&ctx, creds("longenough")).await.unwrap();
        let stored = f.repository.auth(&ctx).await.unwrap();

        f.clock.advance(Duration::minutes(1));
        let err = f.service.authenticate(&ctx, creds("short")).await.unwrap_err();
        assert!(matches!(err, Error::WeakCredential { .. }));
        assert_eq!(f.repository.auth(&ctx).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn authenticate_stores_only_the_digest() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();

        let state = f.service.authenticate(&ctx, creds("longenough")).await.unwrap();
        assert_eq!(state.status, AuthStatus::Connected);
        assert_eq!(state.method, AuthMethod::AppPassword);
        assert_eq!(state.updated_at, start());

        let record = f.repository.auth(&ctx).await.unwrap().unwrap();
        let expected = Sha256Hasher.hash(RawSecret::new("longenough")).unwrap();
        assert_eq!(record.secret_hash, expected);
        assert_ne!(record.secret_hash.as_str(), "longenough");
        assert_eq!(record.state, state);
    }

    #[tokio::test]
    async fn reauthenticating_overwrites_record() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();
        f.service.authenticate(&ctx, creds("longenough")).await.unwrap();

        f.clock.advance(Duration::hours(1));
        let second = f
            .service
            .authenticate(&ctx, AuthRequest::new("oauth", "other@example.com", "ya29.token-value"))
            .await
            .unwrap();

        let state = f.service.state(&ctx).await.unwrap();
        assert_eq!(state.auth, Some(second));
        assert_eq!(state.auth.unwrap().updated_at, start() + Duration::hours(1));
    }

    #[tokio::test]
    async fn hasher_is_not_called_for_rejected_requests() {
        let repository = Arc::new(MemoryRepository::new());
        let hasher = Arc::new(RecordingHasher::default());
        let service = ProviderService::new(
            repository,
            hasher.clone(),
            Arc::new(SyntheticGenerator::new()),
            MockClock::shared(start()),
        );
        let ctx = Context::new();

        let _ = service.authenticate(&ctx, creds("longenough")).await;
        service.configure_provider(&ctx, &gmail()).await.unwrap();
        let _ = service.authenticate(&ctx, creds("short")).await;
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 0);

        service.authenticate(&ctx, creds("longenough")).await.unwrap();
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_preconditions_in_order() {
        let f = fixture();
        let ctx = Context::new();

        let err = f.service.fetch_emails(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured));

        f.service.configure_provider(&ctx, &gmail()).await.unwrap();
        let err = f.service.fetch_emails(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));

        let state = f.service.state(&ctx).await.unwrap();
        assert_eq!(state.stage(), Stage::Configured);
    }

    #[tokio::test]
    async fn fetch_stores_batch_and_reports_count() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();
        f.service.authenticate(&ctx, creds("longenough")).await.unwrap();

        f.clock.advance(Duration::minutes(10));
        let messages = f.service.fetch_emails(&ctx).await.unwrap();
        assert!(!messages.is_empty());

        let state = f.service.state(&ctx).await.unwrap();
        assert_eq!(state.messages_fetched, messages.len());
        assert_eq!(state.last_sync, Some(start() + Duration::minutes(10)));
        assert_eq!(state.stage(), Stage::Synced);

        let stored = f.repository.messages(&ctx).await.unwrap().unwrap();
        assert_eq!(stored.messages, messages);
    }

    #[tokio::test]
    async fn fetch_passes_current_config_auth_and_time() {
        let repository = Arc::new(MemoryRepository::new());
        let generator = Arc::new(CapturingGenerator::default());
        let clock = MockClock::shared(start());
        let service = ProviderService::new(
            repository,
            Arc::new(Sha256Hasher),
            generator.clone(),
            clock.clone(),
        );
        let ctx = Context::new();
        service.configure_provider(&ctx, &imap()).await.unwrap();
        let auth = service.authenticate(&ctx, creds("longenough")).await.unwrap();
        clock.advance(Duration::seconds(30));

        service.fetch_emails(&ctx).await.unwrap();

        let (config, seen_auth, now) = generator.seen.lock().unwrap().clone().unwrap();
        assert_eq!(config.display_name, "Ops Mail");
        assert_eq!(seen_auth, auth);
        assert_eq!(now, start() + Duration::seconds(30));
    }

    #[tokio::test]
    async fn returned_batch_is_independent_of_storage() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();
        f.service.authenticate(&ctx, creds("longenough")).await.unwrap();

        let mut messages = f.service.fetch_emails(&ctx).await.unwrap();
        messages[0].labels.push("Tampered".to_string());
        messages.clear();

        let stored = f.repository.messages(&ctx).await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 3);
        assert!(!stored.messages[0].labels.contains(&"Tampered".to_string()));
    }

    #[tokio::test]
    async fn reconfigure_resets_auth_and_messages() {
        let f = fixture();
        let ctx = Context::new();
        f.service.configure_provider(&ctx, &gmail()).await.unwrap();
        f.service.authenticate(&ctx, creds("longenough")).await.unwrap();
        f.service.fetch_emails(&ctx).await.unwrap();

        f.service.configure_provider(&ctx, &gmail()).await.unwrap();

        let state = f.service.state(&ctx).await.unwrap();
        assert!(state.config.is_some());
        assert!(state.auth.is_none());
        assert_eq!(state.messages_fetched, 0);
        assert!(state.last_sync.is_none());
        assert_eq!(state.stage(), Stage::Configured);
    }

    #[tokio::test]
    async fn cancelled_context_aborts_without_writes() {
        let f = fixture();
        let live = Context::new();
        f.service.configure_provider(&live, &gmail()).await.unwrap();
        f.service.authenticate(&live, creds("longenough")).await.unwrap();
        let before = f.service.state(&live).await.unwrap();

        let cancelled = Context::new();
        cancelled.cancel();

        let err = f
            .service
            .configure_provider(&cancelled, &imap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
        let err = f
            .service
            .authenticate(&cancelled, creds("anotherlongone"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
        let err = f.service.fetch_emails(&cancelled).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
        let err = f.service.state(&cancelled).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));

        assert_eq!(f.service.state(&live).await.unwrap(), before);
    }

    #[tokio::test]
    async fn hasher_failure_is_a_collaborator_error() {
        let repository = Arc::new(MemoryRepository::new());
        let service = ProviderService::new(
            repository.clone(),
            Arc::new(FailingHasher),
            Arc::new(SyntheticGenerator::new()),
            MockClock::shared(start()),
        );
        let ctx = Context::new();
        service.configure_provider(&ctx, &gmail()).await.unwrap();

        let err = service.authenticate(&ctx, creds("longenough")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Collaborator {
                port: Port::SecretHasher,
                ..
            }
        ));
        assert!(repository.auth(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn generator_failure_keeps_previous_batch() {
        let repository = Arc::new(MemoryRepository::new());
        let ctx = Context::new();
        let working = ProviderService::new(
            repository.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(SyntheticGenerator::new()),
            MockClock::shared(start()),
        );
        working.configure_provider(&ctx, &gmail()).await.unwrap();
        working.authenticate(&ctx, creds("longenough")).await.unwrap();
        working.fetch_emails(&ctx).await.unwrap();
        let before = repository.messages(&ctx).await.unwrap();

        let failing = ProviderService::new(
            repository.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(FailingGenerator),
            MockClock::shared(start() + Duration::hours(1)),
        );
        let err = failing.fetch_emails(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Collaborator {
                port: Port::MessageGenerator,
                ..
            }
        ));
        assert_eq!(repository.messages(&ctx).await.unwrap(), before);
    }
}

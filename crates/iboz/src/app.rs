//! Command dispatch.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use iboz_core::provider::RawSecret;
use iboz_core::{
    AuthRequest, Context, EmailMessage, MemoryRepository, ProviderConfigRequest, ProviderService,
    Repository, ServiceState, SqliteRepository,
};

use crate::cli::{Cli, Command};
use crate::settings::Settings;

/// Environment variable holding the authentication secret.
const SECRET_ENV: &str = "IBOZ_SECRET";

/// Snapshot as printed by the CLI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateView {
    config: Option<iboz_core::ProviderConfig>,
    auth: Option<iboz_core::AuthState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync: Option<String>,
    messages_fetched: usize,
}

impl From<ServiceState> for StateView {
    fn from(state: ServiceState) -> Self {
        Self {
            config: state.config,
            auth: state.auth,
            last_sync: state.last_sync.map(rfc3339),
            messages_fetched: state.messages_fetched,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchView {
    messages: Vec<EmailMessage>,
    synced_at: Option<String>,
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Run one command against the configured repository.
pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let repository = open_repository(&settings, cli.in_memory).await?;
    let service = ProviderService::with_defaults(repository);

    let ctx = Context::with_timeout(settings.timeout());
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    match cli.command {
        Command::State => {
            let state = service.state(&ctx).await?;
            print_json(&StateView::from(state))
        }
        Command::Configure { file } => {
            let request = read_config_request(&file).await?;
            service.configure_provider(&ctx, &request).await?;
            let state = service.state(&ctx).await?;
            print_json(&StateView::from(state))
        }
        Command::Authenticate { method, username } => {
            let secret = read_secret().await?;
            service
                .authenticate(&ctx, AuthRequest::new(method, username, secret))
                .await?;
            let state = service.state(&ctx).await?;
            print_json(&StateView::from(state))
        }
        Command::Fetch => {
            let messages = service.fetch_emails(&ctx).await?;
            let synced_at = service.state(&ctx).await?.last_sync.map(rfc3339);
            print_json(&FetchView {
                messages,
                synced_at,
            })
        }
    }
}

async fn open_repository(
    settings: &Settings,
    in_memory: bool,
) -> anyhow::Result<Arc<dyn Repository>> {
    if in_memory || settings.in_memory {
        debug!("Using in-memory repository");
        return Ok(Arc::new(MemoryRepository::new()));
    }

    let path = settings.resolve_database_path().await?;
    let path_str = path
        .to_str()
        .with_context(|| format!("database path is not UTF-8: {}", path.display()))?;
    let repository = SqliteRepository::new(path_str)
        .await
        .with_context(|| format!("opening database {}", path.display()))?;

    info!("Opened database at {}", path.display());
    Ok(Arc::new(repository))
}

async fn read_config_request(file: &Path) -> anyhow::Result<ProviderConfigRequest> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", file.display()))
}

async fn read_secret() -> anyhow::Result<RawSecret> {
    if let Ok(secret) = std::env::var(SECRET_ENV) {
        return Ok(RawSecret::new(secret));
    }

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("reading secret from stdin")?;
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(RawSecret::new(line))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

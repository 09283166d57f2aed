//! `SQLite` repository.
//!
//! Each entity lives in a single-row table keyed by `id = 1`. Label lists are
//! stored as JSON text and instants as RFC 3339 strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::Repository;
use crate::context::Context;
use crate::error::{PortError, PortResult};
use crate::provider::{
    AuthMethod, AuthRecord, AuthState, AuthStatus, ConnectionSettings, EmailMessage, Importance,
    MessageBatch, Protocol, Provider, ProviderConfig, SecretHash,
};

/// Errors raised by the `SQLite` repository.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Stored timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// A stored value is not one the model accepts.
    #[error("Invalid stored value for {column}: {value}")]
    Corrupt {
        /// Column holding the value.
        column: &'static str,
        /// Offending value.
        value: String,
    },
}

impl From<StorageError> for PortError {
    fn from(error: StorageError) -> Self {
        Self::failure(error)
    }
}

type StorageResult<T> = std::result::Result<T, StorageError>;

/// Repository backed by a `SQLite` database.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> StorageResult<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS provider_config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                provider TEXT NOT NULL,
                display_name TEXT NOT NULL,
                protocol TEXT NOT NULL,
                host TEXT,
                port INTEGER,
                use_tls INTEGER NOT NULL DEFAULT 0,
                api_base_url TEXT,
                sync_window_hours INTEGER NOT NULL,
                label_filters TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS auth_record (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                method TEXT NOT NULL,
                username TEXT NOT NULL,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                secret_hash TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS message_batch (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                synced_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                position INTEGER PRIMARY KEY,
                message_id TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                sender TEXT NOT NULL DEFAULT '',
                received_at TEXT NOT NULL,
                snippet TEXT NOT NULL DEFAULT '',
                labels TEXT NOT NULL DEFAULT '[]',
                importance TEXT NOT NULL DEFAULT 'normal'
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn write_config<'e, E>(executor: E, config: &ProviderConfig) -> StorageResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let labels = serde_json::to_string(&config.label_filters)?;
        sqlx::query(
            r"
            INSERT INTO provider_config (
                id, provider, display_name, protocol, host, port, use_tls,
                api_base_url, sync_window_hours, label_filters
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                provider = excluded.provider,
                display_name = excluded.display_name,
                protocol = excluded.protocol,
                host = excluded.host,
                port = excluded.port,
                use_tls = excluded.use_tls,
                api_base_url = excluded.api_base_url,
                sync_window_hours = excluded.sync_window_hours,
                label_filters = excluded.label_filters,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(config.provider.as_str())
        .bind(&config.display_name)
        .bind(config.connection.protocol.as_str())
        .bind(config.connection.host.as_deref())
        .bind(config.connection.port.map(i64::from))
        .bind(config.connection.use_tls)
        .bind(config.connection.api_base_url.as_deref())
        .bind(i64::from(config.sync_window_hours))
        .bind(labels)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn load_config(&self) -> StorageResult<Option<ProviderConfig>> {
        let row = sqlx::query(
            r"
            SELECT provider, display_name, protocol, host, port, use_tls,
                   api_base_url, sync_window_hours, label_filters
            FROM provider_config
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_config).transpose()
    }

    async fn load_auth(&self) -> StorageResult<Option<AuthRecord>> {
        let row = sqlx::query(
            r"
            SELECT method, username, status, updated_at, secret_hash
            FROM auth_record
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_auth).transpose()
    }

    async fn load_messages(&self) -> StorageResult<Option<MessageBatch>> {
        let mut tx = self.pool.begin().await?;

        let Some(batch) = sqlx::query("SELECT synced_at FROM message_batch WHERE id = 1")
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let synced_at = parse_instant(batch.try_get("synced_at")?)?;

        let rows = sqlx::query(
            r"
            SELECT message_id, subject, sender, received_at, snippet, labels, importance
            FROM messages
            ORDER BY position ASC
            ",
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let messages = rows
            .iter()
            .map(row_to_message)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Some(MessageBatch {
            messages,
            synced_at,
        }))
    }

    async fn write_messages(&self, batch: &MessageBatch) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages").execute(&mut *tx).await?;

        for (position, message) in batch.messages.iter().enumerate() {
            let labels = serde_json::to_string(&message.labels)?;
            sqlx::query(
                r"
                INSERT INTO messages
                    (position, message_id, subject, sender, received_at, snippet, labels, importance)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(&message.id)
            .bind(&message.subject)
            .bind(&message.sender)
            .bind(message.received_at.to_rfc3339())
            .bind(&message.snippet)
            .bind(labels)
            .bind(message.importance.as_str())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r"
            INSERT INTO message_batch (id, synced_at) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET synced_at = excluded.synced_at
            ",
        )
        .bind(batch.synced_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Stored {} synced messages", batch.messages.len());
        Ok(())
    }

    async fn delete_messages(conn: &mut sqlx::SqliteConnection) -> StorageResult<()> {
        sqlx::query("DELETE FROM messages").execute(&mut *conn).await?;
        sqlx::query("DELETE FROM message_batch")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn write_replacement(&self, config: &ProviderConfig) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_config(&mut *tx, config).await?;
        sqlx::query("DELETE FROM auth_record")
            .execute(&mut *tx)
            .await?;
        Self::delete_messages(&mut *tx).await?;
        tx.commit().await?;
        debug!("Replaced provider configuration");
        Ok(())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn save_config(&self, ctx: &Context, config: &ProviderConfig) -> PortResult<()> {
        ctx.run(Self::write_config(&self.pool, config)).await??;
        Ok(())
    }

    async fn config(&self, ctx: &Context) -> PortResult<Option<ProviderConfig>> {
        Ok(ctx.run(self.load_config()).await??)
    }

    async fn save_auth(&self, ctx: &Context, record: &AuthRecord) -> PortResult<()> {
        let query = sqlx::query(
            r"
            INSERT INTO auth_record (id, method, username, status, updated_at, secret_hash)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                method = excluded.method,
                username = excluded.username,
                status = excluded.status,
                updated_at = excluded.updated_at,
                secret_hash = excluded.secret_hash
            ",
        )
        .bind(record.state.method.as_str())
        .bind(&record.state.username)
        .bind(record.state.status.as_str())
        .bind(record.state.updated_at.to_rfc3339())
        .bind(record.secret_hash.as_str())
        .execute(&self.pool);

        ctx.run(query).await?.map_err(StorageError::from)?;
        Ok(())
    }

    async fn auth(&self, ctx: &Context) -> PortResult<Option<AuthRecord>> {
        Ok(ctx.run(self.load_auth()).await??)
    }

    async fn clear_auth(&self, ctx: &Context) -> PortResult<()> {
        let query = sqlx::query("DELETE FROM auth_record").execute(&self.pool);
        ctx.run(query).await?.map_err(StorageError::from)?;
        Ok(())
    }

    async fn save_messages(&self, ctx: &Context, batch: &MessageBatch) -> PortResult<()> {
        ctx.run(self.write_messages(batch)).await??;
        Ok(())
    }

    async fn messages(&self, ctx: &Context) -> PortResult<Option<MessageBatch>> {
        Ok(ctx.run(self.load_messages()).await??)
    }

    async fn clear_messages(&self, ctx: &Context) -> PortResult<()> {
        let clear = async {
            let mut tx = self.pool.begin().await?;
            Self::delete_messages(&mut *tx).await?;
            tx.commit().await?;
            Ok::<_, StorageError>(())
        };
        ctx.run(clear).await??;
        Ok(())
    }

    async fn replace_config(&self, ctx: &Context, config: &ProviderConfig) -> PortResult<()> {
        ctx.run(self.write_replacement(config)).await??;
        Ok(())
    }
}

fn parse_instant(value: &str) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn parse_labels(value: &str) -> StorageResult<Vec<String>> {
    Ok(serde_json::from_str(value)?)
}

/// Convert a database row to a `ProviderConfig`.
fn row_to_config(row: &SqliteRow) -> StorageResult<ProviderConfig> {
    let provider: &str = row.try_get("provider")?;
    let provider = Provider::parse(provider).ok_or_else(|| StorageError::Corrupt {
        column: "provider",
        value: provider.to_string(),
    })?;

    let protocol: &str = row.try_get("protocol")?;
    let protocol = Protocol::parse(protocol).ok_or_else(|| StorageError::Corrupt {
        column: "protocol",
        value: protocol.to_string(),
    })?;

    let port = row
        .try_get::<Option<i64>, _>("port")?
        .map(|port| {
            u16::try_from(port).map_err(|_| StorageError::Corrupt {
                column: "port",
                value: port.to_string(),
            })
        })
        .transpose()?;

    let window: i64 = row.try_get("sync_window_hours")?;
    let sync_window_hours = u32::try_from(window).map_err(|_| StorageError::Corrupt {
        column: "sync_window_hours",
        value: window.to_string(),
    })?;

    Ok(ProviderConfig {
        provider,
        display_name: row.try_get("display_name")?,
        connection: ConnectionSettings {
            protocol,
            host: row.try_get("host")?,
            port,
            use_tls: row.try_get("use_tls")?,
            api_base_url: row.try_get("api_base_url")?,
        },
        sync_window_hours,
        label_filters: parse_labels(row.try_get("label_filters")?)?,
    })
}

/// Convert a database row to an `AuthRecord`.
fn row_to_auth(row: &SqliteRow) -> StorageResult<AuthRecord> {
    let method: &str = row.try_get("method")?;
    let method = AuthMethod::parse(method).ok_or_else(|| StorageError::Corrupt {
        column: "method",
        value: method.to_string(),
    })?;

    let status: &str = row.try_get("status")?;
    if status != AuthStatus::Connected.as_str() {
        return Err(StorageError::Corrupt {
            column: "status",
            value: status.to_string(),
        });
    }

    Ok(AuthRecord {
        state: AuthState {
            method,
            username: row.try_get("username")?,
            status: AuthStatus::Connected,
            updated_at: parse_instant(row.try_get("updated_at")?)?,
        },
        secret_hash: SecretHash::from_digest(row.try_get::<String, _>("secret_hash")?),
    })
}

/// Convert a database row to an `EmailMessage`.
fn row_to_message(row: &SqliteRow) -> StorageResult<EmailMessage> {
    Ok(EmailMessage {
        id: row.try_get("message_id")?,
        subject: row.try_get("subject")?,
        sender: row.try_get("sender")?,
        received_at: parse_instant(row.try_get("received_at")?)?,
        snippet: row.try_get("snippet")?,
        labels: parse_labels(row.try_get("labels")?)?,
        importance: Importance::from_stored(row.try_get("importance")?),
    })
}

//! Storage port for the provider integration.
//!
//! A [`Repository`] holds at most one configuration, one authentication
//! record and one message batch. All getters return owned copies.

mod memory;
mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::{SqliteRepository, StorageError};

use async_trait::async_trait;

use crate::context::Context;
use crate::error::PortResult;
use crate::provider::{AuthRecord, MessageBatch, ProviderConfig};

/// Storage of configuration, authentication and synced messages.
///
/// Every operation must fail with [`crate::PortError::Cancelled`] instead of
/// completing once `ctx` is cancelled or expired.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Stores the provider configuration, replacing any previous one.
    async fn save_config(&self, ctx: &Context, config: &ProviderConfig) -> PortResult<()>;

    /// Returns the stored configuration.
    async fn config(&self, ctx: &Context) -> PortResult<Option<ProviderConfig>>;

    /// Stores the authentication record, replacing any previous one.
    async fn save_auth(&self, ctx: &Context, record: &AuthRecord) -> PortResult<()>;

    /// Returns the stored authentication record.
    async fn auth(&self, ctx: &Context) -> PortResult<Option<AuthRecord>>;

    /// Removes the authentication record.
    async fn clear_auth(&self, ctx: &Context) -> PortResult<()>;

    /// Stores a message batch, replacing any previous one.
    async fn save_messages(&self, ctx: &Context, batch: &MessageBatch) -> PortResult<()>;

    /// Returns the stored message batch.
    async fn messages(&self, ctx: &Context) -> PortResult<Option<MessageBatch>>;

    /// Removes the message batch.
    async fn clear_messages(&self, ctx: &Context) -> PortResult<()>;

    /// Stores a new configuration and drops the authentication record and
    /// message batch that belonged to the previous one.
    ///
    /// The default runs the three primitives in sequence. Adapters that can
    /// apply them as a unit should override it.
    async fn replace_config(&self, ctx: &Context, config: &ProviderConfig) -> PortResult<()> {
        self.save_config(ctx, config).await?;
        self.clear_auth(ctx).await?;
        self.clear_messages(ctx).await
    }
}

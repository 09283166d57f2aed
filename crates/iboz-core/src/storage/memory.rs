//! In-memory repository.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use super::Repository;
use crate::context::Context;
use crate::error::PortResult;
use crate::provider::{AuthRecord, MessageBatch, ProviderConfig};

#[derive(Debug, Default)]
struct Slots {
    config: Option<ProviderConfig>,
    auth: Option<AuthRecord>,
    messages: Option<MessageBatch>,
}

/// Repository that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    slots: RwLock<Slots>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn save_config(&self, ctx: &Context, config: &ProviderConfig) -> PortResult<()> {
        ctx.check()?;
        self.write().config = Some(config.clone());
        Ok(())
    }

    async fn config(&self, ctx: &Context) -> PortResult<Option<ProviderConfig>> {
        ctx.check()?;
        Ok(self.read().config.clone())
    }

    async fn save_auth(&self, ctx: &Context, record: &AuthRecord) -> PortResult<()> {
        ctx.check()?;
        self.write().auth = Some(record.clone());
        Ok(())
    }

    async fn auth(&self, ctx: &Context) -> PortResult<Option<AuthRecord>> {
        ctx.check()?;
        Ok(self.read().auth.clone())
    }

    async fn clear_auth(&self, ctx: &Context) -> PortResult<()> {
        ctx.check()?;
        self.write().auth = None;
        Ok(())
    }

    async fn save_messages(&self, ctx: &Context, batch: &MessageBatch) -> PortResult<()> {
        ctx.check()?;
        self.write().messages = Some(batch.clone());
        Ok(())
    }

    async fn messages(&self, ctx: &Context) -> PortResult<Option<MessageBatch>> {
        ctx.check()?;
        Ok(self.read().messages.clone())
    }

    async fn clear_messages(&self, ctx: &Context) -> PortResult<()> {
        ctx.check()?;
        self.write().messages = None;
        Ok(())
    }

    async fn replace_config(&self, ctx: &Context, config: &ProviderConfig) -> PortResult<()> {
        ctx.check()?;
        let mut slots = self.write();
        slots.config = Some(config.clone());
        slots.auth = None;
        slots.messages = None;
        debug!("Replaced provider configuration in memory");
        Ok(())
    }
}

//! Message retrieval port.

mod synthetic;

pub use synthetic::SyntheticGenerator;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::context::Context;
use crate::error::PortResult;
use crate::provider::{AuthState, EmailMessage, ProviderConfig};

/// Produces the message batch for one sync.
///
/// Implementations must be deterministic for identical arguments and keep
/// no state between calls.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    /// Retrieves messages for `config` as seen by `auth` at `now`.
    async fn generate(
        &self,
        ctx: &Context,
        config: &ProviderConfig,
        auth: &AuthState,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<EmailMessage>>;
}

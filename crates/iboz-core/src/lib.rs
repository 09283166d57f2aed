//! # iboz-core
//!
//! Core lifecycle logic for the `iboz` mail provider integration.
//!
//! This crate provides:
//! - Provider configuration with validation and normalization
//! - Credential authentication (secrets are stored only as digests)
//! - Message retrieval through a pluggable generator
//! - Repository ports with in-memory and `SQLite` adapters
//! - Cancellation and deadline propagation via [`Context`]
//!
//! ```no_run
//! use iboz_core::{Context, ProviderService, storage::MemoryRepository};
//! use std::sync::Arc;
//!
//! # async fn demo() -> iboz_core::Result<()> {
//! let service = ProviderService::with_defaults(Arc::new(MemoryRepository::new()));
//! let state = service.state(&Context::new()).await?;
//! assert_eq!(state.messages_fetched, 0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod context;
mod error;
pub mod generator;
pub mod provider;
pub mod storage;
pub mod time;

pub use context::{Cancellation, Context};
pub use error::{BoxError, Error, Port, PortError, PortResult, Result};
pub use generator::{MessageGenerator, SyntheticGenerator};
pub use provider::{
    AuthMethod, AuthRequest, AuthState, AuthStatus, EmailMessage, Importance, Provider,
    ProviderConfig, ProviderConfigRequest, ProviderService, ServiceState, Stage,
};
pub use storage::{MemoryRepository, Repository, SqliteRepository};

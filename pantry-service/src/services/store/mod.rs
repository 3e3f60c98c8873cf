//! Pantry row storage.
//!
//! Every operation is scoped by user id. Update and delete carry both the row
//! id and the user id in the single mutating call, so ownership is checked
//! atomically with the write.

pub mod memory;
pub mod rest;

use crate::config::{PantryConfig, StoreBackend};
use crate::models::{PantryItem, PantryRow, UserId};
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryPantryStore;
pub use rest::RestPantryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("store transport error: {0}")]
    Transport(String),

    #[error("store internal error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait PantryStore: Send + Sync {
    /// Insert one row for `user`, returning what the store reports as inserted.
    async fn insert(&self, user: &UserId, item: &PantryItem) -> Result<Vec<PantryRow>, StoreError>;

    /// All rows of `user`, ascending by id.
    async fn list(&self, user: &UserId) -> Result<Vec<PantryRow>, StoreError>;

    /// `None` when no row with `id` belongs to `user`.
    async fn update_quantity(
        &self,
        user: &UserId,
        id: i64,
        quantity: i64,
    ) -> Result<Option<PantryRow>, StoreError>;

    /// Returns the removed row, or `None` when no row with `id` belongs to `user`.
    async fn delete(&self, user: &UserId, id: i64) -> Result<Option<PantryRow>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

pub fn build_store(config: &PantryConfig) -> Result<Arc<dyn PantryStore>, AppError> {
    let store: Arc<dyn PantryStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory pantry store; data is lost on restart");
            Arc::new(MemoryPantryStore::new())
        }
        StoreBackend::Rest => {
            let hosted = config.store.hosted.as_ref().ok_or_else(|| {
                AppError::Config(anyhow::anyhow!("STORE_URL is not configured"))
            })?;
            let store = RestPantryStore::new(
                hosted,
                &config.store.table,
                Duration::from_secs(config.store.timeout_secs),
            )
            .map_err(|e| AppError::Config(anyhow::anyhow!(e)))?;
            tracing::info!(
                url = %hosted.url,
                table = %config.store.table,
                "Initialized hosted pantry store"
            );
            Arc::new(store)
        }
    };

    Ok(store)
}

use super::{PantryStore, StoreError};
use crate::models::{PantryItem, PantryRow, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

/// In-process store for local development and tests.
pub struct MemoryPantryStore {
    state: Mutex<MemoryState>,
}

struct MemoryState {
    next_id: i64,
    rows: Vec<PantryRow>,
}

impl Default for MemoryPantryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPantryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_id: 1,
                rows: Vec::new(),
            }),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Internal(format!("memory store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl PantryStore for MemoryPantryStore {
    async fn insert(&self, user: &UserId, item: &PantryItem) -> Result<Vec<PantryRow>, StoreError> {
        let mut state = self.state()?;
        let row = PantryRow {
            id: state.next_id,
            user_id: user.clone(),
            item: item.item.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            created_at: Some(Utc::now()),
        };
        state.next_id += 1;
        state.rows.push(row.clone());
        Ok(vec![row])
    }

    async fn list(&self, user: &UserId) -> Result<Vec<PantryRow>, StoreError> {
        let state = self.state()?;
        Ok(state
            .rows
            .iter()
            .filter(|row| &row.user_id == user)
            .cloned()
            .collect())
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        id: i64,
        quantity: i64,
    ) -> Result<Option<PantryRow>, StoreError> {
        let mut state = self.state()?;
        Ok(state
            .rows
            .iter_mut()
            .find(|row| row.id == id && &row.user_id == user)
            .map(|row| {
                row.quantity = quantity;
                row.clone()
            }))
    }

    async fn delete(&self, user: &UserId, id: i64) -> Result<Option<PantryRow>, StoreError> {
        let mut state = self.state()?;
        let position = state
            .rows
            .iter()
            .position(|row| row.id == id && &row.user_id == user);
        Ok(position.map(|index| state.rows.remove(index)))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.state().map(|_| ())
    }
}

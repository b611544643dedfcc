//! Storage seam for journal entries and streak state.
//!
//! [`JournalStore`] covers pool-level reads and opens transactions;
//! [`JournalTx`] is everything that has to happen inside one unit of work.
//! Dropping a transaction without calling [`JournalTx::commit`] rolls it back.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::entry::{JournalEntry, NewEntry};
use crate::models::streak::StreakState;

pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::MemoryJournalStore;
pub use pool::create_pool;
pub use postgres::PgJournalStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transaction aborted: {0}")]
    Aborted(String),
}

impl StoreError {
    /// Failures where the unit of work was rolled back and a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Aborted(_) => true,
            StoreError::Database(e) => e
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code == "40001" || code == "40P01")
                .unwrap_or(false),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn JournalTx>>;

    /// Distinct days on which the user has at least one entry.
    async fn fetch_all_dates(&self, user_id: Uuid) -> StoreResult<BTreeSet<NaiveDate>>;

    /// Entries in `[start, end]`, oldest first, same-day entries in write order.
    async fn fetch_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<JournalEntry>>;

    async fn load_streak(&self, user_id: Uuid) -> StoreResult<Option<StreakState>>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait JournalTx: Send {
    /// Serializes this transaction against other writers for the same user
    /// until commit or rollback.
    async fn lock_user(&mut self, user_id: Uuid) -> StoreResult<()>;

    async fn insert_entry(&mut self, entry: &NewEntry) -> StoreResult<JournalEntry>;

    /// Removes the entry and all of its children. Returns the entry's date, or
    /// `None` if the user has no such entry.
    async fn delete_entry(&mut self, user_id: Uuid, entry_id: Uuid)
        -> StoreResult<Option<NaiveDate>>;

    async fn fetch_all_dates(&mut self, user_id: Uuid) -> StoreResult<BTreeSet<NaiveDate>>;

    async fn load_streak(&mut self, user_id: Uuid) -> StoreResult<Option<StreakState>>;

    /// Upserts the state. The stored longest streak never decreases.
    async fn save_streak(&mut self, state: &StreakState) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

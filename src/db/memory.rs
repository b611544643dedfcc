//! Process-local store, used when no `DATABASE_URL` is configured and by tests.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! staged copy; commit swaps the copy in, drop throws it away. That gives
//! the same all-or-nothing and same-user serialization guarantees as the
//! Postgres store, at the price of serializing every writer.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{JournalStore, JournalTx, StoreError, StoreResult};
use crate::models::entry::{JournalEntry, NewEntry};
use crate::models::streak::StreakState;

#[derive(Debug, Default, Clone)]
struct MemoryData {
    entries: Vec<JournalEntry>,
    streaks: HashMap<Uuid, StreakState>,
}

impl MemoryData {
    fn dates_for(&self, user_id: Uuid) -> BTreeSet<NaiveDate> {
        self.entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.date)
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct MemoryJournalStore {
    data: Arc<Mutex<MemoryData>>,
    failing_commits: Arc<AtomicUsize>,
}

impl MemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` commits fail and roll back.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl JournalStore for MemoryJournalStore {
    async fn begin(&self) -> StoreResult<Box<dyn JournalTx>> {
        let guard = self.data.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryJournalTx {
            guard,
            staged,
            failing_commits: self.failing_commits.clone(),
        }))
    }

    async fn fetch_all_dates(&self, user_id: Uuid) -> StoreResult<BTreeSet<NaiveDate>> {
        Ok(self.data.lock().await.dates_for(user_id))
    }

    async fn fetch_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<JournalEntry>> {
        let data = self.data.lock().await;
        let mut entries: Vec<JournalEntry> = data
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.date >= start && e.date <= end)
            .cloned()
            .collect();
        // stable, so same-day entries stay in write order
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    async fn load_streak(&self, user_id: Uuid) -> StoreResult<Option<StreakState>> {
        Ok(self.data.lock().await.streaks.get(&user_id).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryJournalTx {
    guard: OwnedMutexGuard<MemoryData>,
    staged: MemoryData,
    failing_commits: Arc<AtomicUsize>,
}

#[async_trait]
impl JournalTx for MemoryJournalTx {
    async fn lock_user(&mut self, _user_id: Uuid) -> StoreResult<()> {
        // The store lock is already held.
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> StoreResult<JournalEntry> {
        let stored = JournalEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            date: entry.date,
            mood: entry.mood,
            sleep_hours: entry.sleep_hours,
            exercise_minutes: entry.exercise_minutes,
            notes: entry.notes.clone(),
            activities: entry.activities.clone(),
            feelings: entry.feelings.clone(),
            symptoms: entry.symptoms.clone(),
            substances: entry.substances.clone(),
            created_at: Utc::now(),
        };
        self.staged.entries.push(stored.clone());
        Ok(stored)
    }

    async fn delete_entry(
        &mut self,
        user_id: Uuid,
        entry_id: Uuid,
    ) -> StoreResult<Option<NaiveDate>> {
        let position = self
            .staged
            .entries
            .iter()
            .position(|e| e.id == entry_id && e.user_id == user_id);
        Ok(position.map(|i| self.staged.entries.remove(i).date))
    }

    async fn fetch_all_dates(&mut self, user_id: Uuid) -> StoreResult<BTreeSet<NaiveDate>> {
        Ok(self.staged.dates_for(user_id))
    }

    async fn load_streak(&mut self, user_id: Uuid) -> StoreResult<Option<StreakState>> {
        Ok(self.staged.streaks.get(&user_id).cloned())
    }

    async fn save_streak(&mut self, state: &StreakState) -> StoreResult<()> {
        let longest = self
            .staged
            .streaks
            .get(&state.user_id)
            .map(|s| s.longest_streak)
            .unwrap_or(0)
            .max(state.longest_streak);
        self.staged.streaks.insert(
            state.user_id,
            StreakState {
                longest_streak: longest,
                ..state.clone()
            },
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let injected_failure = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected_failure {
            return Err(StoreError::Aborted("commit failed".into()));
        }

        let MemoryJournalTx {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}

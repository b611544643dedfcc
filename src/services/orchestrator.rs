//! Write and read paths that tie entries, streak state and statistics
//! together.
//!
//! Every write re-derives the current streak from the user's full set of
//! entry days inside the same transaction as the entry change, so a missed
//! update corrects itself on the next write.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::db::{JournalStore, JournalTx, StoreResult};
use crate::error::{AppError, AppResult};
use crate::models::entry::{JournalEntry, NewEntry};
use crate::models::streak::StreakState;
use crate::services::stats::{self, DailyTrend, StatsSummary};
use crate::services::streak::{collapse_days, compute_streak, longest_run};

#[derive(Clone)]
pub struct AggregationOrchestrator {
    store: Arc<dyn JournalStore>,
}

impl AggregationOrchestrator {
    pub fn new(store: Arc<dyn JournalStore>) -> Self {
        Self { store }
    }

    /// Stores the entry and its streak update as one unit of work.
    pub async fn record_entry(
        &self,
        entry: NewEntry,
        today: NaiveDate,
    ) -> AppResult<(JournalEntry, StreakState)> {
        entry.check().map_err(AppError::Validation)?;
        let user_id = entry.user_id;

        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?;
        let saved = tx.insert_entry(&entry).await?;
        let all_dates = tx.fetch_all_dates(user_id).await?;
        let streak = self
            .record_entry_written(tx.as_mut(), user_id, saved.date, all_dates, today)
            .await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            entry_id = %saved.id,
            current_streak = streak.current_streak,
            longest_streak = streak.longest_streak,
            "Journal entry recorded"
        );

        Ok((saved, streak))
    }

    /// Recomputes and saves the streak after `entry_date` was written.
    /// `all_entry_dates` may contain duplicates; `entry_date` is always
    /// counted.
    pub async fn record_entry_written<I>(
        &self,
        tx: &mut dyn JournalTx,
        user_id: Uuid,
        entry_date: NaiveDate,
        all_entry_dates: I,
        today: NaiveDate,
    ) -> StoreResult<StreakState>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut days = collapse_days(all_entry_dates);
        days.insert(entry_date);
        let current_streak = compute_streak(&days, today);

        save_recount(tx, user_id, current_streak, Some(entry_date)).await
    }

    /// Deletes the entry with its children and recounts the current streak
    /// from what is left. Returns `false` when there was nothing to delete.
    pub async fn delete_entry(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        today: NaiveDate,
    ) -> AppResult<(bool, StreakState)> {
        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?;

        if tx.delete_entry(user_id, entry_id).await?.is_none() {
            drop(tx);
            tracing::debug!(user_id = %user_id, entry_id = %entry_id, "Entry already gone");
            return Ok((false, self.get_streak(user_id).await?));
        }

        let days = tx.fetch_all_dates(user_id).await?;
        let current_streak = compute_streak(&days, today);
        let latest = days.iter().next_back().copied();
        let streak = save_recount(tx.as_mut(), user_id, current_streak, latest).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            entry_id = %entry_id,
            current_streak = streak.current_streak,
            "Journal entry deleted"
        );

        Ok((true, streak))
    }

    /// Persisted streak, without recomputation. Zeros for a user with no state.
    pub async fn get_streak(&self, user_id: Uuid) -> AppResult<StreakState> {
        Ok(self
            .store
            .load_streak(user_id)
            .await?
            .unwrap_or_else(|| StreakState::empty(user_id)))
    }

    /// Full rescan of the user's history. Raises the longest streak to the
    /// best run actually present in the stored entries.
    pub async fn rebuild_streak(&self, user_id: Uuid, today: NaiveDate) -> AppResult<StreakState> {
        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?;

        let days: BTreeSet<NaiveDate> = tx.fetch_all_dates(user_id).await?;
        let existing = tx.load_streak(user_id).await?;
        if days.is_empty() && existing.is_none() {
            return Ok(StreakState::empty(user_id));
        }

        let existing = existing.unwrap_or_else(|| StreakState::empty(user_id));
        let current_streak = compute_streak(&days, today);
        let historical = longest_run(&days.range(..=today).copied().collect());
        let state = StreakState {
            longest_streak: existing.longest_streak.max(historical),
            ..existing.advance(current_streak, days.iter().next_back().copied())
        };
        tx.save_streak(&state).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            current_streak = state.current_streak,
            longest_streak = state.longest_streak,
            "Streak rebuilt"
        );

        Ok(state)
    }

    /// Statistics over `[start, end]` inclusive. An inverted range is empty.
    pub async fn get_stats(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<StatsSummary> {
        if start > end {
            return Ok(StatsSummary::default());
        }
        let entries = self.store.fetch_range(user_id, start, end).await?;
        Ok(stats::compute_stats(&entries))
    }

    pub async fn daily_trend(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DailyTrend>> {
        if start > end {
            return Ok(Vec::new());
        }
        let entries = self.store.fetch_range(user_id, start, end).await?;
        Ok(stats::daily_trend(&entries, start, end))
    }

    /// Entries in `[start, end]`, newest first.
    pub async fn list_entries(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<JournalEntry>> {
        if start > end {
            return Ok(Vec::new());
        }
        let mut entries = self.store.fetch_range(user_id, start, end).await?;
        entries.reverse();
        Ok(entries)
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await?;
        Ok(())
    }
}

async fn save_recount(
    tx: &mut dyn JournalTx,
    user_id: Uuid,
    current_streak: i32,
    last_entry_date: Option<NaiveDate>,
) -> StoreResult<StreakState> {
    let existing = tx
        .load_streak(user_id)
        .await?
        .unwrap_or_else(|| StreakState::empty(user_id));
    let state = existing.advance(current_streak, last_entry_date);
    tx.save_streak(&state).await?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryJournalStore;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn setup() -> (MemoryJournalStore, AggregationOrchestrator) {
        let store = MemoryJournalStore::new();
        let orchestrator = AggregationOrchestrator::new(Arc::new(store.clone()));
        (store, orchestrator)
    }

    async fn write(
        orchestrator: &AggregationOrchestrator,
        user: Uuid,
        date: NaiveDate,
        today: NaiveDate,
    ) -> (JournalEntry, StreakState) {
        orchestrator
            .record_entry(NewEntry::new(user, date), today)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn consecutive_writes_build_streak() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();

        write(&orchestrator, user, day(1, 1), day(1, 1)).await;
        write(&orchestrator, user, day(1, 2), day(1, 2)).await;
        let (_, streak) = write(&orchestrator, user, day(1, 3), day(1, 3)).await;

        assert_eq!(streak.current_streak, 3);
        assert_eq!(streak.longest_streak, 3);
        assert_eq!(streak.last_entry_date, Some(day(1, 3)));
        assert_eq!(orchestrator.get_streak(user).await.unwrap(), streak);
    }

    #[tokio::test]
    async fn same_day_entries_count_once() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();

        write(&orchestrator, user, day(1, 2), day(1, 2)).await;
        write(&orchestrator, user, day(1, 3), day(1, 3)).await;
        write(&orchestrator, user, day(1, 3), day(1, 3)).await;
        let (_, streak) = write(&orchestrator, user, day(1, 3), day(1, 3)).await;

        assert_eq!(streak.current_streak, 2);
    }

    #[tokio::test]
    async fn deleting_middle_day_breaks_streak() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        let today = day(1, 3);

        write(&orchestrator, user, day(1, 1), today).await;
        let (middle, _) = write(&orchestrator, user, day(1, 2), today).await;
        let (_, streak) = write(&orchestrator, user, day(1, 3), today).await;
        assert_eq!(streak.current_streak, 3);

        let (deleted, streak) = orchestrator
            .delete_entry(user, middle.id, today)
            .await
            .unwrap();
        assert!(deleted);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 3);
        assert_eq!(streak.last_entry_date, Some(day(1, 3)));
    }

    #[tokio::test]
    async fn deleting_unknown_entry_is_a_no_op() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        write(&orchestrator, user, day(1, 1), day(1, 1)).await;

        let (deleted, streak) = orchestrator
            .delete_entry(user, Uuid::new_v4(), day(1, 1))
            .await
            .unwrap();
        assert!(!deleted);
        assert_eq!(streak.current_streak, 1);
    }

    #[tokio::test]
    async fn other_users_entries_cannot_be_deleted() {
        let (store, orchestrator) = setup();
        let owner = Uuid::new_v4();
        let (entry, _) = write(&orchestrator, owner, day(1, 1), day(1, 1)).await;

        let (deleted, _) = orchestrator
            .delete_entry(Uuid::new_v4(), entry.id, day(1, 1))
            .await
            .unwrap();
        assert!(!deleted);
        assert_eq!(store.fetch_all_dates(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn longest_streak_never_decreases() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        let mut previous_longest = 0;

        // four-day run, a gap, then a two-day run
        let writes = [
            (day(1, 1), day(1, 1)),
            (day(1, 2), day(1, 2)),
            (day(1, 3), day(1, 3)),
            (day(1, 4), day(1, 4)),
            (day(1, 8), day(1, 8)),
            (day(1, 9), day(1, 9)),
        ];
        for (date, today) in writes {
            let (_, streak) = write(&orchestrator, user, date, today).await;
            assert!(streak.longest_streak >= previous_longest);
            assert!(streak.longest_streak >= streak.current_streak);
            previous_longest = streak.longest_streak;
        }

        let streak = orchestrator.get_streak(user).await.unwrap();
        assert_eq!(streak.current_streak, 2);
        assert_eq!(streak.longest_streak, 4);
    }

    #[tokio::test]
    async fn invalid_entry_is_rejected_before_any_write() {
        let (store, orchestrator) = setup();
        let user = Uuid::new_v4();
        let mut entry = NewEntry::new(user, day(1, 1));
        entry.mood = Some(0);

        let err = orchestrator.record_entry(entry, day(1, 1)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.fetch_all_dates(user).await.unwrap().is_empty());
        assert!(store.load_streak(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_commit_saves_neither_entry_nor_streak() {
        let (store, orchestrator) = setup();
        let user = Uuid::new_v4();
        write(&orchestrator, user, day(1, 1), day(1, 1)).await;

        store.fail_next_commits(1);
        let err = orchestrator
            .record_entry(NewEntry::new(user, day(1, 2)), day(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Consistency(_)));

        assert_eq!(store.fetch_all_dates(user).await.unwrap().len(), 1);
        let streak = orchestrator.get_streak(user).await.unwrap();
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.last_entry_date, Some(day(1, 1)));

        // retry goes through
        let (_, streak) = write(&orchestrator, user, day(1, 2), day(1, 2)).await;
        assert_eq!(streak.current_streak, 2);
    }

    #[tokio::test]
    async fn stale_streak_heals_on_next_write() {
        let (store, orchestrator) = setup();
        let user = Uuid::new_v4();

        // entries land without their streak update
        let mut tx = store.begin().await.unwrap();
        tx.insert_entry(&NewEntry::new(user, day(1, 1))).await.unwrap();
        tx.insert_entry(&NewEntry::new(user, day(1, 2))).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(orchestrator.get_streak(user).await.unwrap().current_streak, 0);

        let (_, streak) = write(&orchestrator, user, day(1, 3), day(1, 3)).await;
        assert_eq!(streak.current_streak, 3);
        assert_eq!(streak.longest_streak, 3);
    }

    #[tokio::test]
    async fn future_dated_entry_does_not_break_streak() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        let today = day(1, 3);

        write(&orchestrator, user, day(1, 2), today).await;
        write(&orchestrator, user, day(1, 3), today).await;
        let (_, streak) = write(&orchestrator, user, day(1, 20), today).await;

        assert_eq!(streak.current_streak, 2);
        assert_eq!(streak.last_entry_date, Some(day(1, 20)));
    }

    #[tokio::test]
    async fn record_entry_written_collapses_duplicates() {
        let (store, orchestrator) = setup();
        let user = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        let state = orchestrator
            .record_entry_written(
                tx.as_mut(),
                user,
                day(1, 3),
                vec![day(1, 1), day(1, 2), day(1, 2), day(1, 1)],
                day(1, 3),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(state.current_streak, 3);
        assert_eq!(store.load_streak(user).await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn missing_state_reads_as_zero() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        let streak = orchestrator.get_streak(user).await.unwrap();
        assert_eq!(streak, StreakState::empty(user));

        let stats = orchestrator.get_stats(user, day(1, 1), day(1, 31)).await.unwrap();
        assert_eq!(stats, StatsSummary::default());
    }

    #[tokio::test]
    async fn stats_cover_inclusive_range() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        let today = day(1, 10);

        let writes = [
            (day(1, 1), Some(2)),
            (day(1, 2), Some(8)),
            (day(1, 2), Some(6)),
            (day(1, 3), None),
            (day(1, 4), Some(10)),
        ];
        for (date, mood) in writes {
            let mut entry = NewEntry::new(user, date);
            entry.mood = mood;
            orchestrator.record_entry(entry, today).await.unwrap();
        }

        let stats = orchestrator.get_stats(user, day(1, 2), day(1, 3)).await.unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.average_mood, 7.0);

        let inverted = orchestrator.get_stats(user, day(1, 3), day(1, 2)).await.unwrap();
        assert_eq!(inverted, StatsSummary::default());
    }

    #[tokio::test]
    async fn list_entries_is_newest_first() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        for d in [1, 3, 2] {
            write(&orchestrator, user, day(1, d), day(1, 3)).await;
        }

        let entries = orchestrator.list_entries(user, day(1, 1), day(1, 3)).await.unwrap();
        let dates: Vec<NaiveDate> = entries.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day(1, 3), day(1, 2), day(1, 1)]);
    }

    #[tokio::test]
    async fn rebuild_restores_longest_from_history() {
        let (store, orchestrator) = setup();
        let user = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        for d in [1, 2, 3, 4, 5, 9] {
            tx.insert_entry(&NewEntry::new(user, day(1, d))).await.unwrap();
        }
        tx.commit().await.unwrap();

        let state = orchestrator.rebuild_streak(user, day(1, 10)).await.unwrap();
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 5);
        assert_eq!(state.last_entry_date, Some(day(1, 9)));
    }

    #[tokio::test]
    async fn rebuild_without_history_persists_nothing() {
        let (store, orchestrator) = setup();
        let user = Uuid::new_v4();

        let state = orchestrator.rebuild_streak(user, day(1, 10)).await.unwrap();
        assert_eq!(state, StreakState::empty(user));
        assert!(store.load_streak(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_same_user_writes_serialize() {
        let (_, orchestrator) = setup();
        let user = Uuid::new_v4();
        let today = day(1, 10);

        let handles: Vec<_> = (1..=10)
            .map(|d| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator
                        .record_entry(NewEntry::new(user, day(1, d)), today)
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let streak = orchestrator.get_streak(user).await.unwrap();
        assert_eq!(streak.current_streak, 10);
        assert_eq!(streak.longest_streak, 10);
    }
}

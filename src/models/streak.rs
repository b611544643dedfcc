use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted per-user streak counters. `longest_streak >= current_streak` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct StreakState {
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_entry_date: Option<NaiveDate>,
}

impl StreakState {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_entry_date: None,
        }
    }

    /// Next state after a recount. The longest streak only ever grows.
    pub fn advance(&self, current_streak: i32, last_entry_date: Option<NaiveDate>) -> Self {
        Self {
            user_id: self.user_id,
            current_streak,
            longest_streak: self.longest_streak.max(current_streak),
            last_entry_date,
        }
    }
}

//! Consecutive-day journaling streaks.
//!
//! Everything here works on distinct calendar days. Callers collapse same-day
//! entries with [`collapse_days`] first; `today` is always passed in.

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Collapses entry dates to the set of distinct calendar days.
pub fn collapse_days<I>(dates: I) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = NaiveDate>,
{
    dates.into_iter().collect()
}

/// Number of consecutive days ending today, or yesterday when nothing has been
/// written today yet. Days after `today` are ignored.
pub fn compute_streak(entry_dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> i32 {
    let mut check_date = if entry_dates.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut current_streak = 0i32;
    for date in entry_dates.range(..=check_date).rev() {
        if *date != check_date {
            break;
        }
        current_streak += 1;
        match check_date.pred_opt() {
            Some(prev) => check_date = prev,
            None => break,
        }
    }

    current_streak
}

/// Longest run of consecutive days anywhere in the history. Full scan, so it
/// is kept off the write path.
pub fn longest_run(entry_dates: &BTreeSet<NaiveDate>) -> i32 {
    let mut longest = 0i32;
    let mut run = 0i32;
    let mut prev_date: Option<NaiveDate> = None;

    for date in entry_dates {
        run = match prev_date {
            Some(prev) if prev.succ_opt() == Some(*date) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev_date = Some(*date);
    }

    longest
}

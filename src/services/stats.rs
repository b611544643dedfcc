//! Range statistics over journal entries: averages, label rankings and a
//! per-day trend series.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::entry::{JournalEntry, MOOD_MAX, MOOD_MIN};

/// A label with the number of times it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// Labels ordered by descending count. Equal counts keep the order in which
/// the labels were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ranking(Vec<LabelCount>);

impl Ranking {
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: IndexMap<&str, i64> = IndexMap::new();
        for label in labels {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            *counts.entry(label).or_insert(0) += 1;
        }

        let mut ranked: Vec<LabelCount> = counts
            .into_iter()
            .map(|(label, count)| LabelCount {
                label: label.to_string(),
                count,
            })
            .collect();
        // sort_by is stable, so ties stay in first-seen order
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        Self(ranked)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn count_of(&self, label: &str) -> Option<i64> {
        self.0.iter().find(|c| c.label == label).map(|c| c.count)
    }

    pub fn pairs(&self) -> Vec<(&str, i64)> {
        self.0.iter().map(|c| (c.label.as_str(), c.count)).collect()
    }
}

/// Aggregates for a set of entries. Averages are `0.0` when nothing
/// contributed; the matching `*_entries` count tells the two cases apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_entries: i64,
    pub average_mood: f64,
    pub average_sleep: f64,
    pub average_exercise: f64,
    pub mood_entries: i64,
    pub sleep_entries: i64,
    pub exercise_entries: i64,
    pub top_activities: Ranking,
    pub top_feelings: Ranking,
    pub symptom_frequency: Ranking,
    pub substance_use: Ranking,
}

/// One day of the trend series. Averages are `None` on days without data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub entries: i64,
    pub average_mood: Option<f64>,
    pub average_sleep: Option<f64>,
    pub average_exercise: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    samples: i64,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.samples += 1;
    }

    fn value(&self) -> Option<f64> {
        if self.samples == 0 {
            None
        } else {
            Some(self.sum / self.samples as f64)
        }
    }
}

#[derive(Debug, Default)]
struct Means {
    mood: Mean,
    sleep: Mean,
    exercise: Mean,
}

impl Means {
    fn push(&mut self, entry: &JournalEntry) {
        if let Some(mood) = valid_mood(entry) {
            self.mood.push(mood);
        }
        if let Some(sleep) = valid_sleep(entry) {
            self.sleep.push(sleep);
        }
        if let Some(minutes) = valid_exercise(entry) {
            self.exercise.push(minutes);
        }
    }
}

fn valid_mood(entry: &JournalEntry) -> Option<f64> {
    entry
        .mood
        .filter(|m| (MOOD_MIN..=MOOD_MAX).contains(m))
        .map(f64::from)
}

fn valid_sleep(entry: &JournalEntry) -> Option<f64> {
    entry.sleep_hours.filter(|h| h.is_finite() && *h >= 0.0)
}

fn valid_exercise(entry: &JournalEntry) -> Option<f64> {
    entry.exercise_minutes.filter(|m| *m >= 0).map(f64::from)
}

/// Averages and rankings over `entries`, in the order given.
pub fn compute_stats(entries: &[JournalEntry]) -> StatsSummary {
    let mut means = Means::default();
    for entry in entries {
        means.push(entry);
    }

    StatsSummary {
        total_entries: entries.len() as i64,
        average_mood: means.mood.value().unwrap_or(0.0),
        average_sleep: means.sleep.value().unwrap_or(0.0),
        average_exercise: means.exercise.value().unwrap_or(0.0),
        mood_entries: means.mood.samples,
        sleep_entries: means.sleep.samples,
        exercise_entries: means.exercise.samples,
        top_activities: Ranking::from_labels(
            entries.iter().flat_map(|e| e.activities.iter().map(String::as_str)),
        ),
        top_feelings: Ranking::from_labels(
            entries.iter().flat_map(|e| e.feelings.iter().map(String::as_str)),
        ),
        symptom_frequency: Ranking::from_labels(
            entries
                .iter()
                .flat_map(|e| e.symptoms.iter().map(|s| s.symptom.as_str())),
        ),
        substance_use: Ranking::from_labels(
            entries
                .iter()
                .flat_map(|e| e.substances.iter().map(|s| s.substance.as_str())),
        ),
    }
}

/// Dense per-day series over `[start, end]`, including days with no entries.
pub fn daily_trend(entries: &[JournalEntry], start: NaiveDate, end: NaiveDate) -> Vec<DailyTrend> {
    if start > end {
        return Vec::new();
    }

    let mut by_day: BTreeMap<NaiveDate, (i64, Means)> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.date >= start && e.date <= end) {
        let (count, means) = by_day.entry(entry.date).or_default();
        *count += 1;
        means.push(entry);
    }

    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| match by_day.get(&date) {
            Some((count, means)) => DailyTrend {
                date,
                entries: *count,
                average_mood: means.mood.value(),
                average_sleep: means.sleep.value(),
                average_exercise: means.exercise.value(),
            },
            None => DailyTrend {
                date,
                entries: 0,
                average_mood: None,
                average_sleep: None,
                average_exercise: None,
            },
        })
        .collect()
}

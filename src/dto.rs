//! Request/response types for the HTTP layer.
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body or query params
//! - `*Response` → serialized to client JSON
//! - Dates are ISO calendar days (`YYYY-MM-DD`)
//! - Field validation is expressed via `validator` derive macros

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::entry::{is_supported_date, JournalEntry, NewEntry, Substance, Symptom};
use crate::models::streak::StreakState;

const MAX_LABEL_LEN: usize = 100;

// ============================================================================
// Entries
// ============================================================================

/// POST /api/entries
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryRequest {
    /// Calendar day of the entry. Default: today.
    pub date: Option<NaiveDate>,

    #[validate(range(min = 1, max = 10, message = "Mood must be between 1 and 10"))]
    pub mood: Option<i32>,

    #[validate(range(min = 0.0, max = 24.0, message = "Sleep hours must be between 0 and 24"))]
    pub sleep_hours: Option<f64>,

    #[validate(range(min = 0, max = 1440, message = "Exercise minutes must be between 0 and 1440"))]
    pub exercise_minutes: Option<i32>,

    #[validate(length(max = 10000, message = "Notes must be under 10000 characters"))]
    pub notes: Option<String>,

    #[serde(default)]
    #[validate(custom = "validate_labels")]
    pub activities: Vec<String>,

    #[serde(default)]
    #[validate(custom = "validate_labels")]
    pub feelings: Vec<String>,

    #[serde(default)]
    #[validate]
    pub symptoms: Vec<SymptomInput>,

    #[serde(default)]
    #[validate]
    pub substances: Vec<SubstanceInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SymptomInput {
    #[validate(length(min = 1, max = 100, message = "Symptom must be 1-100 characters"))]
    pub symptom: String,

    #[validate(range(min = 1, max = 10, message = "Severity must be between 1 and 10"))]
    pub severity: i32,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubstanceInput {
    #[validate(length(min = 1, max = 100, message = "Substance must be 1-100 characters"))]
    pub substance: String,

    #[validate(length(max = 100))]
    pub amount: Option<String>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn validate_labels(labels: &[String]) -> Result<(), ValidationError> {
    for label in labels {
        let len = label.trim().chars().count();
        if len == 0 || len > MAX_LABEL_LEN {
            let mut err = ValidationError::new("label_length");
            err.message = Some("Labels must be 1-100 characters".into());
            return Err(err);
        }
    }
    Ok(())
}

impl CreateEntryRequest {
    /// Trims labels and collapses repeated activities/feelings within the
    /// entry, keeping the first occurrence.
    pub fn into_new_entry(self, user_id: Uuid, today: NaiveDate) -> NewEntry {
        NewEntry {
            user_id,
            date: self.date.unwrap_or(today),
            mood: self.mood,
            sleep_hours: self.sleep_hours,
            exercise_minutes: self.exercise_minutes,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            activities: distinct_labels(self.activities),
            feelings: distinct_labels(self.feelings),
            symptoms: self
                .symptoms
                .into_iter()
                .map(|s| Symptom {
                    symptom: s.symptom.trim().to_string(),
                    severity: s.severity,
                    category: s.category.trim().to_string(),
                })
                .collect(),
            substances: self
                .substances
                .into_iter()
                .map(|s| Substance {
                    substance: s.substance.trim().to_string(),
                    amount: s.amount,
                    notes: s.notes,
                })
                .collect(),
        }
    }
}

fn distinct_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}

/// Response for POST /api/entries
#[derive(Debug, Serialize)]
pub struct RecordEntryResponse {
    pub entry: JournalEntry,
    pub streak: StreakResponse,
}

/// Response for DELETE /api/entries/{id}
#[derive(Debug, Serialize)]
pub struct DeleteEntryResponse {
    pub deleted: bool,
    pub id: Uuid,
    pub streak: StreakResponse,
}

// ============================================================================
// Ranges
// ============================================================================

/// Query params for stats, trends and entry listings
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RangeQuery {
    /// Fills in defaults: `end` is today, `start` is `default_days` before
    /// `end`. An inverted range is passed through untouched. Dates outside
    /// the storable calendar range are rejected.
    pub fn resolve(
        &self,
        today: NaiveDate,
        default_days: i64,
        max_days: i64,
    ) -> Result<(NaiveDate, NaiveDate), String> {
        let end = self.end_date.unwrap_or(today);
        let start = match self.start_date {
            Some(start) => start,
            None => end
                .checked_sub_signed(Duration::days(default_days))
                .ok_or_else(|| "Date out of range".to_string())?,
        };
        if !is_supported_date(start) || !is_supported_date(end) {
            return Err("Date out of range".into());
        }

        if start <= end && (end - start).num_days() + 1 > max_days {
            return Err(format!("Date range must not exceed {max_days} days"));
        }
        Ok((start, end))
    }
}

// ============================================================================
// Streak
// ============================================================================

/// GET /api/streak
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakResponse {
    pub current_streak: i32,
    pub longest_streak: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_entry_date: Option<NaiveDate>,
}

impl From<StreakState> for StreakResponse {
    fn from(s: StreakState) -> Self {
        Self {
            current_streak: s.current_streak,
            longest_streak: s.longest_streak,
            last_entry_date: s.last_entry_date,
        }
    }
}

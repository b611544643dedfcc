use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const MOOD_MIN: i32 = 1;
pub const MOOD_MAX: i32 = 10;
pub const SEVERITY_MIN: i32 = 1;
pub const SEVERITY_MAX: i32 = 10;
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// Whether the date fits the storable calendar range.
pub fn is_supported_date(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// One journaling event. A user may write several on the same calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub mood: Option<i32>,
    pub sleep_hours: Option<f64>,
    pub exercise_minutes: Option<i32>,
    pub notes: Option<String>,
    pub activities: Vec<String>,
    pub feelings: Vec<String>,
    pub symptoms: Vec<Symptom>,
    pub substances: Vec<Substance>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Symptom {
    pub symptom: String,
    pub severity: i32,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Substance {
    pub substance: String,
    pub amount: Option<String>,
    pub notes: Option<String>,
}

/// The `journal_entries` row without its child collections.
#[derive(Debug, Clone, FromRow)]
pub struct EntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "entry_date")]
    pub date: NaiveDate,
    pub mood: Option<i32>,
    pub sleep_hours: Option<f64>,
    pub exercise_minutes: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EntryRow {
    pub fn into_entry(
        self,
        activities: Vec<String>,
        feelings: Vec<String>,
        symptoms: Vec<Symptom>,
        substances: Vec<Substance>,
    ) -> JournalEntry {
        JournalEntry {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            mood: self.mood,
            sleep_hours: self.sleep_hours,
            exercise_minutes: self.exercise_minutes,
            notes: self.notes,
            activities,
            feelings,
            symptoms,
            substances,
            created_at: self.created_at,
        }
    }
}

/// A validated, normalised entry that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub mood: Option<i32>,
    pub sleep_hours: Option<f64>,
    pub exercise_minutes: Option<i32>,
    pub notes: Option<String>,
    pub activities: Vec<String>,
    pub feelings: Vec<String>,
    pub symptoms: Vec<Symptom>,
    pub substances: Vec<Substance>,
}

impl NewEntry {
    pub fn new(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            mood: None,
            sleep_hours: None,
            exercise_minutes: None,
            notes: None,
            activities: Vec::new(),
            feelings: Vec::new(),
            symptoms: Vec::new(),
            substances: Vec::new(),
        }
    }

    /// Range checks that must hold before anything is written.
    pub fn check(&self) -> Result<(), String> {
        if !is_supported_date(self.date) {
            return Err(format!("Date must be between years {MIN_YEAR} and {MAX_YEAR}"));
        }
        if let Some(mood) = self.mood {
            if !(MOOD_MIN..=MOOD_MAX).contains(&mood) {
                return Err(format!("Mood must be between {MOOD_MIN} and {MOOD_MAX}"));
            }
        }
        if let Some(sleep) = self.sleep_hours {
            if !sleep.is_finite() || sleep < 0.0 {
                return Err("Sleep hours must be a non-negative number".into());
            }
        }
        if let Some(minutes) = self.exercise_minutes {
            if minutes < 0 {
                return Err("Exercise minutes must not be negative".into());
            }
        }
        for symptom in &self.symptoms {
            if !(SEVERITY_MIN..=SEVERITY_MAX).contains(&symptom.severity) {
                return Err(format!(
                    "Severity for {} must be between {SEVERITY_MIN} and {SEVERITY_MAX}",
                    symptom.symptom
                ));
            }
        }
        let blank_label = self
            .activities
            .iter()
            .chain(&self.feelings)
            .any(|l| l.trim().is_empty())
            || self.symptoms.iter().any(|s| s.symptom.trim().is_empty())
            || self.substances.iter().any(|s| s.substance.trim().is_empty());
        if blank_label {
            return Err("Labels must not be blank".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> NewEntry {
        NewEntry::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    #[test]
    fn check_accepts_boundaries() {
        let mut e = entry();
        e.mood = Some(10);
        e.sleep_hours = Some(0.0);
        e.exercise_minutes = Some(0);
        assert!(e.check().is_ok());
        e.mood = Some(1);
        assert!(e.check().is_ok());
    }

    #[test]
    fn check_rejects_out_of_range_values() {
        let mut e = entry();
        e.mood = Some(11);
        assert!(e.check().is_err());

        let mut e = entry();
        e.sleep_hours = Some(-0.5);
        assert!(e.check().is_err());

        let mut e = entry();
        e.exercise_minutes = Some(-1);
        assert!(e.check().is_err());

        let mut e = entry();
        e.symptoms.push(Symptom {
            symptom: "Headache".into(),
            severity: 0,
            category: "pain".into(),
        });
        assert!(e.check().is_err());
    }

    #[test]
    fn check_rejects_unstorable_dates() {
        let e = NewEntry::new(Uuid::new_v4(), NaiveDate::MIN);
        assert!(e.check().is_err());

        let e = NewEntry::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(10000, 1, 1).unwrap());
        assert!(e.check().is_err());

        let e = NewEntry::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
        assert!(e.check().is_ok());
    }

    #[test]
    fn check_rejects_blank_labels() {
        let mut e = entry();
        e.activities.push("   ".into());
        assert_eq!(e.check(), Err("Labels must not be blank".to_string()));
    }
}

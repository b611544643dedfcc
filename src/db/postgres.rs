use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{JournalStore, JournalTx, StoreError, StoreResult};
use crate::models::entry::{EntryRow, JournalEntry, NewEntry, Substance, Symptom};
use crate::models::streak::StreakState;

const ENTRY_COLUMNS: &str =
    "id, user_id, entry_date, mood, sleep_hours, exercise_minutes, notes, created_at";

#[derive(Clone)]
pub struct PgJournalStore {
    pool: PgPool,
}

impl PgJournalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JournalStore for PgJournalStore {
    async fn begin(&self) -> StoreResult<Box<dyn JournalTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgJournalTx { tx }))
    }

    async fn fetch_all_dates(&self, user_id: Uuid) -> StoreResult<BTreeSet<NaiveDate>> {
        let mut conn = self.pool.acquire().await?;
        fetch_dates(&mut conn, user_id).await
    }

    async fn fetch_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM journal_entries
            WHERE user_id = $1 AND entry_date BETWEEN $2 AND $3
            ORDER BY entry_date ASC, created_at ASC, id ASC
            "#
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut children = fetch_children(&mut conn, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let c = children.remove(&row.id).unwrap_or_default();
                row.into_entry(c.activities, c.feelings, c.symptoms, c.substances)
            })
            .collect())
    }

    async fn load_streak(&self, user_id: Uuid) -> StoreResult<Option<StreakState>> {
        let mut conn = self.pool.acquire().await?;
        load_streak(&mut conn, user_id).await
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgJournalTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl JournalTx for PgJournalTx {
    async fn lock_user(&mut self, user_id: Uuid) -> StoreResult<()> {
        // Released automatically at commit or rollback. Covers the first write
        // too, when there is no streak row to lock yet.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> StoreResult<JournalEntry> {
        let conn: &mut PgConnection = &mut self.tx;

        let row = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            INSERT INTO journal_entries (id, user_id, entry_date, mood, sleep_hours, exercise_minutes, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.date)
        .bind(entry.mood)
        .bind(entry.sleep_hours)
        .bind(entry.exercise_minutes)
        .bind(&entry.notes)
        .fetch_one(&mut *conn)
        .await?;

        for (position, activity) in entry.activities.iter().enumerate() {
            sqlx::query(
                "INSERT INTO entry_activities (entry_id, position, activity) VALUES ($1, $2, $3)",
            )
            .bind(row.id)
            .bind(position as i32)
            .bind(activity)
            .execute(&mut *conn)
            .await?;
        }

        for (position, feeling) in entry.feelings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO entry_feelings (entry_id, position, feeling) VALUES ($1, $2, $3)",
            )
            .bind(row.id)
            .bind(position as i32)
            .bind(feeling)
            .execute(&mut *conn)
            .await?;
        }

        for (position, symptom) in entry.symptoms.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO entry_symptoms (entry_id, position, symptom, severity, category)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(row.id)
            .bind(position as i32)
            .bind(&symptom.symptom)
            .bind(symptom.severity)
            .bind(&symptom.category)
            .execute(&mut *conn)
            .await?;
        }

        for (position, substance) in entry.substances.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO entry_substances (entry_id, position, substance, amount, notes)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(row.id)
            .bind(position as i32)
            .bind(&substance.substance)
            .bind(&substance.amount)
            .bind(&substance.notes)
            .execute(&mut *conn)
            .await?;
        }

        Ok(row.into_entry(
            entry.activities.clone(),
            entry.feelings.clone(),
            entry.symptoms.clone(),
            entry.substances.clone(),
        ))
    }

    async fn delete_entry(
        &mut self,
        user_id: Uuid,
        entry_id: Uuid,
    ) -> StoreResult<Option<NaiveDate>> {
        // Child rows go with it via ON DELETE CASCADE.
        let date = sqlx::query_scalar::<_, NaiveDate>(
            "DELETE FROM journal_entries WHERE id = $1 AND user_id = $2 RETURNING entry_date",
        )
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(date)
    }

    async fn fetch_all_dates(&mut self, user_id: Uuid) -> StoreResult<BTreeSet<NaiveDate>> {
        fetch_dates(&mut self.tx, user_id).await
    }

    async fn load_streak(&mut self, user_id: Uuid) -> StoreResult<Option<StreakState>> {
        load_streak(&mut self.tx, user_id).await
    }

    async fn save_streak(&mut self, state: &StreakState) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_streaks (user_id, current_streak, longest_streak, last_entry_date, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                current_streak = EXCLUDED.current_streak,
                longest_streak = GREATEST(user_streaks.longest_streak, EXCLUDED.longest_streak),
                last_entry_date = EXCLUDED.last_entry_date,
                updated_at = NOW()
            "#,
        )
        .bind(state.user_id)
        .bind(state.current_streak)
        .bind(state.longest_streak)
        .bind(state.last_entry_date)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Aborted(format!("commit failed: {e}")))
    }
}

async fn fetch_dates(conn: &mut PgConnection, user_id: Uuid) -> StoreResult<BTreeSet<NaiveDate>> {
    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT DISTINCT entry_date FROM journal_entries WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(dates.into_iter().collect())
}

async fn load_streak(conn: &mut PgConnection, user_id: Uuid) -> StoreResult<Option<StreakState>> {
    let state = sqlx::query_as::<_, StreakState>(
        r#"
        SELECT user_id, current_streak, longest_streak, last_entry_date
        FROM user_streaks WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(state)
}

#[derive(Default)]
struct EntryChildren {
    activities: Vec<String>,
    feelings: Vec<String>,
    symptoms: Vec<Symptom>,
    substances: Vec<Substance>,
}

async fn fetch_children(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, EntryChildren>> {
    let mut children: HashMap<Uuid, EntryChildren> = HashMap::new();

    let activities = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT entry_id, activity FROM entry_activities
        WHERE entry_id = ANY($1) ORDER BY entry_id, position
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    for (entry_id, activity) in activities {
        children.entry(entry_id).or_default().activities.push(activity);
    }

    let feelings = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT entry_id, feeling FROM entry_feelings
        WHERE entry_id = ANY($1) ORDER BY entry_id, position
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    for (entry_id, feeling) in feelings {
        children.entry(entry_id).or_default().feelings.push(feeling);
    }

    let symptoms = sqlx::query_as::<_, (Uuid, String, i32, String)>(
        r#"
        SELECT entry_id, symptom, severity, category FROM entry_symptoms
        WHERE entry_id = ANY($1) ORDER BY entry_id, position
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    for (entry_id, symptom, severity, category) in symptoms {
        children.entry(entry_id).or_default().symptoms.push(Symptom {
            symptom,
            severity,
            category,
        });
    }

    let substances = sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>)>(
        r#"
        SELECT entry_id, substance, amount, notes FROM entry_substances
        WHERE entry_id = ANY($1) ORDER BY entry_id, position
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    for (entry_id, substance, amount, notes) in substances {
        children.entry(entry_id).or_default().substances.push(Substance {
            substance,
            amount,
            notes,
        });
    }

    Ok(children)
}

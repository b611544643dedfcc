use axum::{extract::State, Extension, Json};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::{CreateEntryRequest, DeleteEntryResponse, RangeQuery, RecordEntryResponse};
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::models::entry::JournalEntry;
use crate::AppState;

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(body): AppJson<CreateEntryRequest>,
) -> AppResult<Json<RecordEntryResponse>> {
    body.validate()?;

    let today = state.today();
    let entry = body.into_new_entry(auth_user.id, today);
    let (entry, streak) = state.orchestrator.record_entry(entry, today).await?;

    Ok(Json(RecordEntryResponse {
        entry,
        streak: streak.into(),
    }))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppQuery(query): AppQuery<RangeQuery>,
) -> AppResult<Json<Vec<JournalEntry>>> {
    let today = state.today();
    let (start, end) = query
        .resolve(today, state.config.stats_default_days, state.config.max_range_days)
        .map_err(AppError::Validation)?;

    let entries = state
        .orchestrator
        .list_entries(auth_user.id, start, end)
        .await?;

    Ok(Json(entries))
}

/// Idempotent: deleting an entry that is already gone still returns 200.
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppPath(entry_id): AppPath<Uuid>,
) -> AppResult<Json<DeleteEntryResponse>> {
    let today = state.today();
    let (deleted, streak) = state
        .orchestrator
        .delete_entry(auth_user.id, entry_id, today)
        .await?;

    Ok(Json(DeleteEntryResponse {
        deleted,
        id: entry_id,
        streak: streak.into(),
    }))
}

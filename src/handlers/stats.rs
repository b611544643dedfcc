use axum::{extract::State, Extension, Json};

use crate::auth::middleware::AuthUser;
use crate::dto::RangeQuery;
use crate::error::{AppError, AppResult};
use crate::extract::AppQuery;
use crate::services::stats::{DailyTrend, StatsSummary};
use crate::AppState;

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppQuery(query): AppQuery<RangeQuery>,
) -> AppResult<Json<StatsSummary>> {
    let today = state.today();
    let (start, end) = query
        .resolve(today, state.config.stats_default_days, state.config.max_range_days)
        .map_err(AppError::Validation)?;

    let stats = state.orchestrator.get_stats(auth_user.id, start, end).await?;
    Ok(Json(stats))
}

pub async fn get_daily_trend(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppQuery(query): AppQuery<RangeQuery>,
) -> AppResult<Json<Vec<DailyTrend>>> {
    let today = state.today();
    let (start, end) = query
        .resolve(today, state.config.stats_default_days, state.config.max_range_days)
        .map_err(AppError::Validation)?;

    let trend = state
        .orchestrator
        .daily_trend(auth_user.id, start, end)
        .await?;
    Ok(Json(trend))
}

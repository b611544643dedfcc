use axum::{extract::State, Extension, Json};

use crate::auth::middleware::AuthUser;
use crate::dto::StreakResponse;
use crate::error::AppResult;
use crate::AppState;

pub async fn get_streak(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<StreakResponse>> {
    let streak = state.orchestrator.get_streak(auth_user.id).await?;
    Ok(Json(streak.into()))
}

pub async fn rebuild_streak(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<StreakResponse>> {
    let today = state.today();
    let streak = state.orchestrator.rebuild_streak(auth_user.id, today).await?;
    Ok(Json(streak.into()))
}

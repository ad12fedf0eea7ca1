use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use crate::error::AppResult;
use crate::models::{DailyHours, DailyHoursInput, DailyHoursSummary};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> AppResult<Json<DailyHoursSummary>> {
    let log = state.daily_logs.log(&owner)?;
    Ok(Json(log.summary()?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(input): Json<DailyHoursInput>,
) -> AppResult<(StatusCode, Json<DailyHours>)> {
    let day = state.daily_hours.insert(&owner, input.into_new()?)?;
    tracing::info!(owner_id = %owner, daily_hours_id = %day.id, "Logged daily hours");
    Ok((StatusCode::CREATED, Json(day)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    Json(input): Json<DailyHoursInput>,
) -> AppResult<Json<DailyHours>> {
    let day = state.daily_hours.update(&owner, &id, &input.into_patch()?)?;
    Ok(Json(day))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.daily_hours.delete(&owner, &id)?;
    tracing::info!(owner_id = %owner, daily_hours_id = %id, "Deleted daily hours");
    Ok(StatusCode::NO_CONTENT)
}

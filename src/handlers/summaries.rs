use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use crate::date_utils::DateFilterable;
use crate::error::{AppError, AppResult};
use crate::models::{PeriodSummary, WeekBucket};
use crate::services::aggregation::{combine, weeks_within};
use crate::services::metrics::{ChartPoint, IncomeSplit, StatsReport, DEFAULT_WINDOW};
use crate::state::AppState;

const DEFAULT_GROUP_SIZE: usize = 2;

#[derive(Debug, Default, Deserialize)]
pub struct PeriodParams {
    pub group_size: Option<usize>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl DateFilterable for PeriodParams {
    fn from_date(&self) -> Option<&String> {
        self.from_date.as_ref()
    }

    fn to_date(&self) -> Option<&String> {
        self.to_date.as_ref()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BreakdownParams {
    pub periods: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartParams {
    pub weeks: Option<usize>,
}

pub async fn weeks(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> AppResult<Json<Vec<WeekBucket>>> {
    let view = state.live.view(&owner)?;
    Ok(Json(view.week_buckets()?))
}

pub async fn periods(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(params): Query<PeriodParams>,
) -> AppResult<Json<Vec<PeriodSummary>>> {
    let group_size = params.group_size.unwrap_or(DEFAULT_GROUP_SIZE);
    if group_size == 0 {
        return Err(AppError::validation(
            "group_size",
            "group_size must be at least 1",
        ));
    }
    let range = params.resolve_date_range()?;

    let view = state.live.view(&owner)?;
    let periods = match range {
        Some(range) => combine(&weeks_within(&view.week_buckets()?, &range), group_size),
        None => view.period_summaries(group_size)?,
    };
    Ok(Json(periods))
}

pub async fn stats(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> AppResult<Json<StatsReport>> {
    let view = state.live.view(&owner)?;
    Ok(Json(view.stats_report(DEFAULT_GROUP_SIZE)?))
}

pub async fn breakdown(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(params): Query<BreakdownParams>,
) -> AppResult<Json<IncomeSplit>> {
    let window = params.periods.unwrap_or(DEFAULT_WINDOW);
    let view = state.live.view(&owner)?;
    Ok(Json(view.income_split(Some(window))?))
}

pub async fn chart(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(params): Query<ChartParams>,
) -> AppResult<Json<Vec<ChartPoint>>> {
    let weeks = params.weeks.unwrap_or(DEFAULT_WINDOW);
    let view = state.live.view(&owner)?;
    Ok(Json(view.chart(weeks)?))
}

/// Ends the owner's live session, releasing its change subscriptions.
pub async fn release(State(state): State<AppState>, Path(owner): Path<String>) -> StatusCode {
    state.live.release(&owner);
    state.daily_logs.release(&owner);
    StatusCode::NO_CONTENT
}

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use crate::date_utils::DateFilterable;
use crate::db::queries::entries::EntryFilter;
use crate::error::AppResult;
use crate::models::{Entry, EntryInput};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EntrySearchParams {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl DateFilterable for EntrySearchParams {
    fn from_date(&self) -> Option<&String> {
        self.from_date.as_ref()
    }

    fn to_date(&self) -> Option<&String> {
        self.to_date.as_ref()
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(params): Query<EntrySearchParams>,
) -> AppResult<Json<Vec<Entry>>> {
    let filter = match params.resolve_date_range()? {
        Some(range) => EntryFilter {
            from_date: Some(range.from),
            to_date: Some(range.to),
        },
        None => EntryFilter::default(),
    };
    let entries = state.store.list_entries(&owner, &filter)?;
    Ok(Json(entries))
}

pub async fn create(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(input): Json<EntryInput>,
) -> AppResult<(StatusCode, Json<Entry>)> {
    let new_entry = input.into_new_entry()?;
    let entry = state.store.insert_entry(&owner, new_entry)?;
    tracing::info!(owner_id = %owner, entry_id = %entry.id, "Created entry");
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    Json(input): Json<EntryInput>,
) -> AppResult<Json<Entry>> {
    let patch = input.into_patch()?;
    let entry = state.store.update_entry(&owner, &id, &patch)?;
    Ok(Json(entry))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.store.delete_entry(&owner, &id)?;
    tracing::info!(owner_id = %owner, entry_id = %id, "Deleted entry");
    Ok(StatusCode::NO_CONTENT)
}

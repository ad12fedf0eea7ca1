use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::{DailyHours, NewDailyHours};

const DAILY_HOURS_COLUMNS: &str =
    "id, owner_id, work_date, hours_worked, description, created_at, updated_at";

fn map_daily_hours(row: &Row<'_>) -> rusqlite::Result<DailyHours> {
    Ok(DailyHours {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        date: row.get(2)?,
        hours_worked: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Most recent day first.
pub fn list_daily_hours(conn: &Connection, owner_id: &str) -> rusqlite::Result<Vec<DailyHours>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM daily_hours WHERE owner_id = ?
         ORDER BY work_date DESC, created_at DESC, id DESC",
        DAILY_HOURS_COLUMNS
    ))?;
    let days = stmt
        .query_map([owner_id], map_daily_hours)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!(owner_id, count = days.len(), "Listed daily hours");
    Ok(days)
}

pub fn get_daily_hours(
    conn: &Connection,
    owner_id: &str,
    id: &str,
) -> rusqlite::Result<Option<DailyHours>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM daily_hours WHERE id = ? AND owner_id = ?",
            DAILY_HOURS_COLUMNS
        ),
        [id, owner_id],
        map_daily_hours,
    )
    .optional()
}

pub fn insert_daily_hours(
    conn: &Connection,
    owner_id: &str,
    day: &NewDailyHours,
) -> rusqlite::Result<DailyHours> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO daily_hours (id, owner_id, work_date, hours_worked, description,
         created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![id, owner_id, day.date, day.hours_worked, day.description, now, now],
    )?;

    debug!(daily_hours_id = %id, owner_id, "Inserted daily hours");
    Ok(DailyHours {
        id,
        owner_id: owner_id.to_string(),
        date: day.date,
        hours_worked: day.hours_worked,
        description: day.description.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn update_daily_hours(
    conn: &Connection,
    owner_id: &str,
    id: &str,
    day: &NewDailyHours,
) -> rusqlite::Result<Option<DailyHours>> {
    let rows = conn.execute(
        "UPDATE daily_hours SET work_date = ?, hours_worked = ?, description = ?, updated_at = ?
         WHERE id = ? AND owner_id = ?",
        params![day.date, day.hours_worked, day.description, Utc::now(), id, owner_id],
    )?;
    if rows == 0 {
        return Ok(None);
    }
    debug!(daily_hours_id = id, owner_id, "Updated daily hours");
    get_daily_hours(conn, owner_id, id)
}

pub fn delete_daily_hours(conn: &Connection, owner_id: &str, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM daily_hours WHERE id = ? AND owner_id = ?",
        [id, owner_id],
    )?;
    Ok(rows > 0)
}

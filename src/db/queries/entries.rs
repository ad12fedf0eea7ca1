use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::models::{Entry, NewEntry};

const ENTRY_COLUMNS: &str = "id, owner_id, period_start, period_end, hours_worked, extra_hours,
     base_amount, tips_amount, currency_code, note, created_at, updated_at";

/// Stable reverse-chronological order by period start.
const ENTRY_ORDER: &str = "period_start DESC, created_at DESC, id DESC";

#[derive(Debug, Default, Clone)]
pub struct EntryFilter {
    /// Inclusive bounds on `period_start`.
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

fn map_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        period_start: row.get(2)?,
        period_end: row.get(3)?,
        hours_worked: row.get(4)?,
        extra_hours: row.get(5)?,
        base_amount: row.get(6)?,
        tips_amount: row.get(7)?,
        currency_code: row.get(8)?,
        note: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn list_entries(
    conn: &Connection,
    owner_id: &str,
    filter: &EntryFilter,
) -> rusqlite::Result<Vec<Entry>> {
    let mut sql = format!("SELECT {} FROM entries WHERE owner_id = ?", ENTRY_COLUMNS);
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id.to_string())];

    if let Some(from_date) = filter.from_date {
        sql.push_str(" AND period_start >= ?");
        params_vec.push(Box::new(from_date));
    }
    if let Some(to_date) = filter.to_date {
        sql.push_str(" AND period_start <= ?");
        params_vec.push(Box::new(to_date));
    }
    sql.push_str(&format!(" ORDER BY {}", ENTRY_ORDER));

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params_refs.as_slice(), map_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!(owner_id, count = entries.len(), "Listed entries");
    Ok(entries)
}

pub fn count_entries(conn: &Connection, owner_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE owner_id = ?",
        [owner_id],
        |row| row.get(0),
    )
}

pub fn get_entry(conn: &Connection, owner_id: &str, id: &str) -> rusqlite::Result<Option<Entry>> {
    trace!(entry_id = id, "Fetching entry");
    conn.query_row(
        &format!(
            "SELECT {} FROM entries WHERE id = ? AND owner_id = ?",
            ENTRY_COLUMNS
        ),
        [id, owner_id],
        map_entry,
    )
    .optional()
}

pub fn insert_entry(conn: &Connection, owner_id: &str, entry: &NewEntry) -> rusqlite::Result<Entry> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO entries (id, owner_id, period_start, period_end, hours_worked, extra_hours,
         base_amount, tips_amount, currency_code, note, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            owner_id,
            entry.period_start,
            entry.period_end,
            entry.hours_worked,
            entry.extra_hours,
            entry.base_amount,
            entry.tips_amount,
            entry.currency_code,
            entry.note,
            now,
            now,
        ],
    )?;

    debug!(entry_id = %id, owner_id, "Inserted entry");
    Ok(Entry {
        id,
        owner_id: owner_id.to_string(),
        period_start: entry.period_start,
        period_end: entry.period_end,
        hours_worked: entry.hours_worked,
        extra_hours: entry.extra_hours,
        base_amount: entry.base_amount,
        tips_amount: entry.tips_amount,
        currency_code: entry.currency_code.clone(),
        note: entry.note.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Overwrites the mutable fields of an owned entry. Returns the stored row, or
/// `None` when the id does not exist for this owner.
pub fn update_entry(
    conn: &Connection,
    owner_id: &str,
    id: &str,
    entry: &NewEntry,
) -> rusqlite::Result<Option<Entry>> {
    let rows = conn.execute(
        "UPDATE entries SET period_start = ?, period_end = ?, hours_worked = ?,
         extra_hours = ?, base_amount = ?, tips_amount = ?, currency_code = ?, note = ?,
         updated_at = ?
         WHERE id = ? AND owner_id = ?",
        params![
            entry.period_start,
            entry.period_end,
            entry.hours_worked,
            entry.extra_hours,
            entry.base_amount,
            entry.tips_amount,
            entry.currency_code,
            entry.note,
            Utc::now(),
            id,
            owner_id,
        ],
    )?;

    if rows == 0 {
        return Ok(None);
    }
    debug!(entry_id = id, owner_id, "Updated entry");
    get_entry(conn, owner_id, id)
}

pub fn delete_entry(conn: &Connection, owner_id: &str, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM entries WHERE id = ? AND owner_id = ?",
        [id, owner_id],
    )?;
    if rows > 0 {
        debug!(entry_id = id, owner_id, "Deleted entry");
    }
    Ok(rows > 0)
}

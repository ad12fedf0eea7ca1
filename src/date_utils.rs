use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::{AppError, AppResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Years accepted at the boundary. Stored dates stay four-digit ISO dates.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// The configured first day of the week. Defaults to Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekStart(pub Weekday);

impl Default for WeekStart {
    fn default() -> Self {
        Self(Weekday::Sun)
    }
}

impl FromStr for WeekStart {
    type Err = chrono::ParseWeekdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Weekday>().map(Self)
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl WeekStart {
    /// Days elapsed since the most recent week start on or before `date`.
    fn offset(&self, date: NaiveDate) -> u64 {
        let day = date.weekday().num_days_from_monday() as i64;
        let first = self.0.num_days_from_monday() as i64;
        (day - first).rem_euclid(7) as u64
    }

    /// Canonical `(week_start, week_end)` pair for a calendar date.
    ///
    /// Works on calendar dates only, so no time-of-day or zone can shift the day.
    /// Weeks that run past chrono's representable range are cut at its limits.
    pub fn week_bounds(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = date
            .checked_sub_days(Days::new(self.offset(date)))
            .unwrap_or(NaiveDate::MIN);
        let end = start
            .checked_add_days(Days::new(6))
            .unwrap_or(NaiveDate::MAX);
        (start, end)
    }

    pub fn week_of(&self, date: NaiveDate) -> NaiveDate {
        self.week_bounds(date).0
    }

    /// Bucket key: the ISO date of the week start.
    pub fn bucket_key(&self, date: NaiveDate) -> String {
        format_date(self.week_of(date))
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Short chart label, e.g. "Jan 7".
pub fn short_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

pub fn parse_date(field: &'static str, value: &str) -> AppResult<NaiveDate> {
    let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AppError::validation(field, format!("'{}' is not a YYYY-MM-DD date", value)))?;
    check_year(field, date)
}

/// Rejects dates outside years `MIN_YEAR..=MAX_YEAR`.
pub fn check_year(field: &'static str, date: NaiveDate) -> AppResult<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(AppError::validation(
            field,
            format!(
                "{} must fall within years {}-{}",
                field, MIN_YEAR, MAX_YEAR
            ),
        ));
    }
    Ok(date)
}

/// Inclusive calendar window used by searches and week lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn from_dates(from: NaiveDate, to: NaiveDate) -> AppResult<Self> {
        if to < from {
            return Err(AppError::validation(
                "to_date",
                "end of range is before its start",
            ));
        }
        Ok(Self { from, to })
    }

    /// The seven days starting at `start`.
    pub fn week_from(start: NaiveDate) -> Self {
        Self {
            from: start,
            to: start.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Query parameter sets that carry an optional `from_date`/`to_date` window.
#[allow(clippy::wrong_self_convention)]
pub trait DateFilterable {
    fn from_date(&self) -> Option<&String>;
    fn to_date(&self) -> Option<&String>;

    /// Both bounds or neither; a half-open window is rejected.
    fn resolve_date_range(&self) -> AppResult<Option<DateRange>> {
        match (self.from_date(), self.to_date()) {
            (None, None) => Ok(None),
            (Some(from), Some(to)) => {
                let from = parse_date("from_date", from)?;
                let to = parse_date("to_date", to)?;
                DateRange::from_dates(from, to).map(Some)
            }
            (None, Some(_)) => Err(AppError::validation("from_date", "from_date is required")),
            (Some(_), None) => Err(AppError::validation("to_date", "to_date is required")),
        }
    }
}

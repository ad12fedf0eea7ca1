use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::date_utils::{check_year, parse_date};
use crate::error::{AppError, AppResult};

pub const DEFAULT_CURRENCY: &str = "USD";

/// One financial record for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub owner_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub hours_worked: f64,
    pub extra_hours: f64,
    pub base_amount: f64,
    pub tips_amount: f64,
    pub currency_code: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new entry. The store assigns id, owner and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub hours_worked: f64,
    pub extra_hours: f64,
    pub base_amount: f64,
    pub tips_amount: f64,
    pub currency_code: String,
    pub note: Option<String>,
}

impl NewEntry {
    /// A one-day record with only the required fields set.
    pub fn new(date: NaiveDate, hours_worked: f64, base_amount: f64) -> Self {
        Self {
            period_start: date,
            period_end: date,
            hours_worked,
            extra_hours: 0.0,
            base_amount,
            tips_amount: 0.0,
            currency_code: DEFAULT_CURRENCY.into(),
            note: None,
        }
    }

    pub fn with_tips(mut self, tips_amount: f64) -> Self {
        self.tips_amount = tips_amount;
        self
    }

    pub fn with_period_end(mut self, period_end: NaiveDate) -> Self {
        self.period_end = period_end;
        self
    }

    pub fn with_currency(mut self, currency_code: &str) -> Self {
        self.currency_code = currency_code.into();
        self
    }

    pub fn validate(mut self) -> AppResult<Self> {
        check_amount("hoursWorked", self.hours_worked)?;
        check_amount("extraHours", self.extra_hours)?;
        check_amount("baseAmount", self.base_amount)?;
        check_amount("tipsAmount", self.tips_amount)?;
        check_year("periodStart", self.period_start)?;
        check_year("periodEnd", self.period_end)?;
        if self.period_end < self.period_start {
            return Err(AppError::validation(
                "periodEnd",
                "periodEnd must not be before periodStart",
            ));
        }
        self.currency_code = normalize_currency(&self.currency_code)?;
        self.note = self.note.and_then(non_empty);
        Ok(self)
    }
}

/// Subset of mutable fields for an update. `id`, owner and `createdAt` never change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub hours_worked: Option<f64>,
    pub extra_hours: Option<f64>,
    pub base_amount: Option<f64>,
    pub tips_amount: Option<f64>,
    pub currency_code: Option<String>,
    /// An empty note clears the stored one.
    pub note: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the patch over `entry` and validates the result as a whole.
    pub fn merge(&self, entry: &Entry) -> AppResult<NewEntry> {
        NewEntry {
            period_start: self.period_start.unwrap_or(entry.period_start),
            period_end: self.period_end.unwrap_or(entry.period_end),
            hours_worked: self.hours_worked.unwrap_or(entry.hours_worked),
            extra_hours: self.extra_hours.unwrap_or(entry.extra_hours),
            base_amount: self.base_amount.unwrap_or(entry.base_amount),
            tips_amount: self.tips_amount.unwrap_or(entry.tips_amount),
            currency_code: self
                .currency_code
                .clone()
                .unwrap_or_else(|| entry.currency_code.clone()),
            note: match &self.note {
                Some(note) => Some(note.clone()),
                None => entry.note.clone(),
            },
        }
        .validate()
    }
}

/// Raw entry fields as they arrive at the boundary (HTTP body or tool arguments).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInput {
    #[serde(alias = "start_date", alias = "period_start")]
    pub period_start: Option<String>,
    #[serde(alias = "end_date", alias = "period_end")]
    pub period_end: Option<String>,
    #[serde(alias = "hours_worked")]
    pub hours_worked: Option<f64>,
    #[serde(alias = "extra_hours")]
    pub extra_hours: Option<f64>,
    #[serde(alias = "base_salary", alias = "base_amount")]
    pub base_amount: Option<f64>,
    #[serde(alias = "tips", alias = "tips_amount")]
    pub tips_amount: Option<f64>,
    #[serde(alias = "currency", alias = "currency_code")]
    pub currency_code: Option<String>,
    #[serde(alias = "description")]
    pub note: Option<String>,
}

impl EntryInput {
    /// Validates a full entry. Dates, hours and base amount are required.
    pub fn into_new_entry(self) -> AppResult<NewEntry> {
        let period_start = required_date("periodStart", self.period_start.as_deref())?;
        let period_end = required_date("periodEnd", self.period_end.as_deref())?;
        let hours_worked = self
            .hours_worked
            .ok_or_else(|| AppError::validation("hoursWorked", "hoursWorked is required"))?;
        let base_amount = self
            .base_amount
            .ok_or_else(|| AppError::validation("baseAmount", "baseAmount is required"))?;

        NewEntry {
            period_start,
            period_end,
            hours_worked,
            extra_hours: self.extra_hours.unwrap_or(0.0),
            base_amount,
            tips_amount: self.tips_amount.unwrap_or(0.0),
            currency_code: self
                .currency_code
                .unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            note: self.note,
        }
        .validate()
    }

    /// Field-level checks only; cross-field checks happen on merge.
    pub fn into_patch(self) -> AppResult<EntryPatch> {
        let period_start = self
            .period_start
            .as_deref()
            .map(|v| parse_date("periodStart", v))
            .transpose()?;
        let period_end = self
            .period_end
            .as_deref()
            .map(|v| parse_date("periodEnd", v))
            .transpose()?;

        for (field, value) in [
            ("hoursWorked", self.hours_worked),
            ("extraHours", self.extra_hours),
            ("baseAmount", self.base_amount),
            ("tipsAmount", self.tips_amount),
        ] {
            if let Some(value) = value {
                check_amount(field, value)?;
            }
        }

        let currency_code = self
            .currency_code
            .as_deref()
            .map(normalize_currency)
            .transpose()?;

        Ok(EntryPatch {
            period_start,
            period_end,
            hours_worked: self.hours_worked,
            extra_hours: self.extra_hours,
            base_amount: self.base_amount,
            tips_amount: self.tips_amount,
            currency_code,
            note: self.note,
        })
    }
}

fn required_date(field: &'static str, value: Option<&str>) -> AppResult<NaiveDate> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_date(field, v),
        _ => Err(AppError::validation(field, format!("{} is required", field))),
    }
}

fn check_amount(field: &'static str, value: f64) -> AppResult<()> {
    if !value.is_finite() {
        return Err(AppError::validation(field, format!("{} must be a number", field)));
    }
    if value < 0.0 {
        return Err(AppError::validation(
            field,
            format!("{} must not be negative", field),
        ));
    }
    Ok(())
}

fn normalize_currency(code: &str) -> AppResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation(
            "currencyCode",
            format!("'{}' is not a three-letter currency code", code),
        ));
    }
    Ok(code.to_ascii_uppercase())
}

pub(crate) fn non_empty(note: String) -> Option<String> {
    let trimmed = note.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

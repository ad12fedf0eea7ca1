use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::date_utils::{check_year, parse_date};
use crate::error::{AppError, AppResult};
use crate::models::change::Record;
use crate::models::entry::non_empty;

/// Upper bound on hours logged for one calendar day.
pub const MAX_DAILY_HOURS: f64 = 24.0;

/// Hours worked on a single day, independent of pay entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyHours {
    pub id: String,
    pub owner_id: String,
    pub date: NaiveDate,
    pub hours_worked: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for DailyHours {
    fn record_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDailyHours {
    pub date: NaiveDate,
    pub hours_worked: f64,
    pub description: Option<String>,
}

impl NewDailyHours {
    pub fn new(date: NaiveDate, hours_worked: f64) -> Self {
        Self {
            date,
            hours_worked,
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(mut self) -> AppResult<Self> {
        check_year("date", self.date)?;
        check_hours(self.hours_worked)?;
        self.description = self.description.and_then(non_empty);
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyHoursPatch {
    pub date: Option<NaiveDate>,
    pub hours_worked: Option<f64>,
    /// An empty description clears the stored one.
    pub description: Option<String>,
}

impl DailyHoursPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge(&self, current: &DailyHours) -> AppResult<NewDailyHours> {
        NewDailyHours {
            date: self.date.unwrap_or(current.date),
            hours_worked: self.hours_worked.unwrap_or(current.hours_worked),
            description: match &self.description {
                Some(description) => Some(description.clone()),
                None => current.description.clone(),
            },
        }
        .validate()
    }
}

/// Daily hours fields as they arrive in a request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyHoursInput {
    #[serde(alias = "work_date")]
    pub date: Option<String>,
    #[serde(alias = "hours_worked", alias = "hours")]
    pub hours_worked: Option<f64>,
    #[serde(alias = "note")]
    pub description: Option<String>,
}

impl DailyHoursInput {
    pub fn into_new(self) -> AppResult<NewDailyHours> {
        let date = match self.date.as_deref() {
            Some(v) if !v.trim().is_empty() => parse_date("date", v)?,
            _ => return Err(AppError::validation("date", "date is required")),
        };
        let hours_worked = self
            .hours_worked
            .ok_or_else(|| AppError::validation("hoursWorked", "hoursWorked is required"))?;

        NewDailyHours {
            date,
            hours_worked,
            description: self.description,
        }
        .validate()
    }

    pub fn into_patch(self) -> AppResult<DailyHoursPatch> {
        let date = self
            .date
            .as_deref()
            .map(|v| parse_date("date", v))
            .transpose()?;
        if let Some(hours) = self.hours_worked {
            check_hours(hours)?;
        }
        Ok(DailyHoursPatch {
            date,
            hours_worked: self.hours_worked,
            description: self.description,
        })
    }
}

fn check_hours(hours: f64) -> AppResult<()> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(AppError::validation(
            "hoursWorked",
            "hoursWorked must be a positive number",
        ));
    }
    if hours > MAX_DAILY_HOURS {
        return Err(AppError::validation(
            "hoursWorked",
            format!("hoursWorked must not exceed {} in one day", MAX_DAILY_HOURS),
        ));
    }
    Ok(())
}

/// An owner's logged days, most recent first, with their summed hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyHoursSummary {
    pub days: Vec<DailyHours>,
    pub total_hours: f64,
}

impl DailyHoursSummary {
    pub fn of(days: Vec<DailyHours>) -> Self {
        let total_hours = days.iter().map(|d| d.hours_worked).sum();
        Self { days, total_hours }
    }
}

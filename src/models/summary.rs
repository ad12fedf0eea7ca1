use chrono::NaiveDate;
use serde::Serialize;

use crate::date_utils::format_date;
use crate::models::entry::Entry;

/// Summed fields of a group of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_hours: f64,
    pub total_extra_hours: f64,
    pub total_base: f64,
    pub total_tips: f64,
    /// Base plus tips.
    pub total_income: f64,
}

impl Totals {
    pub fn add_entry(&mut self, entry: &Entry) {
        self.total_hours += entry.hours_worked;
        self.total_extra_hours += entry.extra_hours;
        self.total_base += entry.base_amount;
        self.total_tips += entry.tips_amount;
        self.total_income += entry.base_amount + entry.tips_amount;
    }

    pub fn add(&mut self, other: &Totals) {
        self.total_hours += other.total_hours;
        self.total_extra_hours += other.total_extra_hours;
        self.total_base += other.total_base;
        self.total_tips += other.total_tips;
        self.total_income += other.total_income;
    }

    pub fn of_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut totals = Self::default();
        for entry in entries {
            totals.add_entry(entry);
        }
        totals
    }
}

/// Anything summarizing a run of entries: weeks and multi-week periods.
pub trait HasTotals {
    fn totals(&self) -> &Totals;
}

/// Entries whose `periodStart` falls in one calendar week, with their totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(flatten)]
    pub totals: Totals,
    /// Distinct currency codes of the members, sorted. More than one means the
    /// totals mix currencies without conversion.
    pub currencies: Vec<String>,
    #[serde(rename = "memberEntries")]
    pub entries: Vec<Entry>,
}

impl WeekBucket {
    pub fn new(week_start: NaiveDate, week_end: NaiveDate) -> Self {
        Self {
            week_start,
            week_end,
            totals: Totals::default(),
            currencies: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        format_date(self.week_start)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.week_start <= date && date <= self.week_end
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_mixed_currency(&self) -> bool {
        self.currencies.len() > 1
    }

    /// Appends a member and folds it into the totals.
    pub fn push(&mut self, entry: Entry) {
        self.totals.add_entry(&entry);
        note_currency(&mut self.currencies, &entry.currency_code);
        self.entries.push(entry);
    }

    /// Recomputes totals and currencies from the current members, in member order.
    pub fn refold(&mut self) {
        self.totals = Totals::of_entries(&self.entries);
        self.currencies.clear();
        for entry in &self.entries {
            note_currency(&mut self.currencies, &entry.currency_code);
        }
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }
}

impl HasTotals for WeekBucket {
    fn totals(&self) -> &Totals {
        &self.totals
    }
}

/// One or more consecutive week buckets combined, e.g. a bi-weekly pay period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    /// Week start of the oldest member week.
    pub start: NaiveDate,
    /// Week end of the newest member week.
    pub end: NaiveDate,
    pub week_count: usize,
    #[serde(flatten)]
    pub totals: Totals,
    pub currencies: Vec<String>,
    #[serde(rename = "memberEntries")]
    pub entries: Vec<Entry>,
}

impl PeriodSummary {
    pub fn from_week(bucket: &WeekBucket) -> Self {
        Self {
            start: bucket.week_start,
            end: bucket.week_end,
            week_count: 1,
            totals: bucket.totals,
            currencies: bucket.currencies.clone(),
            entries: bucket.entries.clone(),
        }
    }

    /// Folds an older week into this period.
    pub fn absorb_older(&mut self, bucket: &WeekBucket) {
        self.start = bucket.week_start;
        self.week_count += 1;
        self.totals.add(&bucket.totals);
        for code in &bucket.currencies {
            note_currency(&mut self.currencies, code);
        }
        self.entries.extend(bucket.entries.iter().cloned());
    }

    pub fn is_mixed_currency(&self) -> bool {
        self.currencies.len() > 1
    }
}

impl HasTotals for PeriodSummary {
    fn totals(&self) -> &Totals {
        &self.totals
    }
}

fn note_currency(currencies: &mut Vec<String>, code: &str) {
    if let Err(pos) = currencies.binary_search_by(|c| c.as_str().cmp(code)) {
        currencies.insert(pos, code.to_string());
    }
}

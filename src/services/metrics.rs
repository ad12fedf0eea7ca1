use serde::Serialize;

use crate::date_utils::short_label;
use crate::models::{Entry, HasTotals, Totals, WeekBucket};
use crate::services::aggregation::combine;

/// Number of most recent weeks shown by charts and breakdowns by default.
pub const DEFAULT_WINDOW: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_entries: usize,
    pub total_hours: f64,
    pub total_extra_hours: f64,
    pub total_income: f64,
    pub total_tips: f64,
    pub average_hourly_rate: f64,
}

impl Stats {
    pub fn from_entries(entries: &[Entry]) -> Self {
        Self::from_totals(entries.len(), &Totals::of_entries(entries))
    }

    pub fn from_buckets(buckets: &[WeekBucket]) -> Self {
        let total_entries = buckets.iter().map(|b| b.entries.len()).sum();
        Self::from_totals(total_entries, &overall_totals(buckets))
    }

    fn from_totals(total_entries: usize, totals: &Totals) -> Self {
        Self {
            total_entries,
            total_hours: totals.total_hours,
            total_extra_hours: totals.total_extra_hours,
            total_income: totals.total_income,
            total_tips: totals.total_tips,
            average_hourly_rate: hourly_rate(totals),
        }
    }
}

/// Overall stats plus the latest week and period trends, all taken from one
/// set of buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: Stats,
    /// Latest week against the one before, in percent.
    pub trend: Option<f64>,
    /// Latest period of `group_size` weeks against the one before, in percent.
    pub period_trend: Option<f64>,
}

/// Base-versus-tips split of income.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSplit {
    pub base: f64,
    pub tips: f64,
    pub base_percent: f64,
    pub tips_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub week: String,
    pub week_start: chrono::NaiveDate,
    pub income: f64,
    pub tips: f64,
    pub base: f64,
    pub hours: f64,
}

pub fn overall_totals<T: HasTotals>(items: &[T]) -> Totals {
    let mut totals = Totals::default();
    for item in items {
        totals.add(item.totals());
    }
    totals
}

/// Income per worked hour; zero when no hours were worked.
pub fn hourly_rate(totals: &Totals) -> f64 {
    if totals.total_hours > 0.0 {
        totals.total_income / totals.total_hours
    } else {
        0.0
    }
}

/// Percentage change in income from the second most recent period to the most
/// recent one. `None` when there is no previous period or it earned nothing.
pub fn trend<T: HasTotals>(periods: &[T]) -> Option<f64> {
    let [current, previous, ..] = periods else {
        return None;
    };
    let previous_income = previous.totals().total_income;
    if previous_income == 0.0 {
        return None;
    }
    let change = (current.totals().total_income - previous_income) / previous_income * 100.0;
    change.is_finite().then_some(change)
}

pub fn stats_report(buckets: &[WeekBucket], group_size: usize) -> StatsReport {
    StatsReport {
        stats: Stats::from_buckets(buckets),
        trend: trend(buckets),
        period_trend: trend(&combine(buckets, group_size)),
    }
}

/// Base-versus-tips split over the `window` most recent periods, or all of them.
pub fn income_split<T: HasTotals>(periods: &[T], window: Option<usize>) -> IncomeSplit {
    let take = window.unwrap_or(periods.len()).min(periods.len());
    let totals = overall_totals(&periods[..take]);
    let sum = totals.total_base + totals.total_tips;
    let percent = |part: f64| if sum > 0.0 { part / sum * 100.0 } else { 0.0 };

    IncomeSplit {
        base: totals.total_base,
        tips: totals.total_tips,
        base_percent: percent(totals.total_base),
        tips_percent: percent(totals.total_tips),
    }
}

/// The `weeks` most recent buckets as chart points, oldest first.
pub fn chart_points(buckets: &[WeekBucket], weeks: usize) -> Vec<ChartPoint> {
    buckets
        .iter()
        .take(weeks)
        .rev()
        .map(|b| ChartPoint {
            week: short_label(b.week_start),
            week_start: b.week_start,
            income: b.totals.total_income,
            tips: b.totals.total_tips,
            base: b.totals.total_base,
            hours: b.totals.total_hours,
        })
        .collect()
}

use std::collections::HashMap;

use crate::date_utils::{DateRange, WeekStart};
use crate::models::{Entry, PeriodSummary, WeekBucket};

/// Groups entries into calendar-week buckets keyed by the week of `periodStart`.
///
/// Buckets come back most recent week first. Members keep the order in which
/// entries were presented; only `periodStart` is consulted for bucketing.
pub fn aggregate<'a, I>(entries: I, week_start: WeekStart) -> Vec<WeekBucket>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let mut buckets: Vec<WeekBucket> = Vec::new();
    let mut index: HashMap<chrono::NaiveDate, usize> = HashMap::new();

    for entry in entries {
        let (start, end) = week_start.week_bounds(entry.period_start);
        let slot = *index.entry(start).or_insert_with(|| {
            buckets.push(WeekBucket::new(start, end));
            buckets.len() - 1
        });
        buckets[slot].push(entry.clone());
    }

    buckets.sort_by(|a, b| b.week_start.cmp(&a.week_start));

    for bucket in buckets.iter().filter(|b| b.is_mixed_currency()) {
        tracing::warn!(
            week = %bucket.key(),
            currencies = ?bucket.currencies,
            "Week totals mix currencies without conversion"
        );
    }

    buckets
}

/// Re-groups a most-recent-first bucket sequence into runs of `group_size`
/// consecutive buckets. The last run may be shorter. `group_size` is clamped
/// to at least one.
pub fn combine(buckets: &[WeekBucket], group_size: usize) -> Vec<PeriodSummary> {
    buckets
        .chunks(group_size.max(1))
        .map(|run| {
            let mut period = PeriodSummary::from_week(&run[0]);
            for older in &run[1..] {
                period.absorb_older(older);
            }
            period
        })
        .collect()
}

/// Buckets whose week start lies within `range`.
pub fn weeks_within(buckets: &[WeekBucket], range: &DateRange) -> Vec<WeekBucket> {
    buckets
        .iter()
        .filter(|b| range.contains(b.week_start))
        .cloned()
        .collect()
}

//! Cached week aggregation kept current from the entry store's change feed.
//!
//! Each change event is applied to the cache as one unit under the write lock,
//! so readers see every bucket either before or after a mutation, never with
//! totals and members out of step. When an event cannot be applied against the
//! cached state, the cache is rebuilt from a full store read instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::date_utils::WeekStart;
use crate::db::queries::entries::EntryFilter;
use crate::error::{AppError, AppResult};
use crate::models::{ChangeEvent, Entry, PeriodSummary, WeekBucket};
use crate::services::aggregation::{aggregate, combine};
use crate::services::metrics::{self, ChartPoint, IncomeSplit, StatsReport};
use crate::store::{EntryStore, Subscription};

/// The cache holds no prior state matching a change event.
#[derive(Debug, Error, PartialEq)]
#[error("no cached state for entry {entry_id} ({kind})")]
pub struct InconsistentCacheState {
    pub entry_id: String,
    pub kind: &'static str,
}

impl InconsistentCacheState {
    fn new(event: &ChangeEvent) -> Self {
        Self {
            entry_id: event.entry_id().to_string(),
            kind: event.kind(),
        }
    }
}

/// Week buckets, most recent first, with an index of where each entry lives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekCache {
    buckets: Vec<WeekBucket>,
    locations: HashMap<String, NaiveDate>,
}

impl WeekCache {
    pub fn build(entries: &[Entry], week_start: WeekStart) -> Self {
        let buckets = aggregate(entries, week_start);
        let locations = buckets
            .iter()
            .flat_map(|b| b.entries.iter().map(move |e| (e.id.clone(), b.week_start)))
            .collect();
        Self { buckets, locations }
    }

    pub fn buckets(&self) -> &[WeekBucket] {
        &self.buckets
    }

    pub fn contains_entry(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    /// Applies one change. On error the cache is left untouched.
    pub fn apply(
        &mut self,
        event: &ChangeEvent,
        week_start: WeekStart,
    ) -> Result<(), InconsistentCacheState> {
        match event {
            ChangeEvent::Insert(entry) => {
                if self.contains_entry(&entry.id) {
                    return Err(InconsistentCacheState::new(event));
                }
                self.insert(entry.clone(), week_start);
            }
            ChangeEvent::Update(entry) => {
                let Some(&old_week) = self.locations.get(&entry.id) else {
                    return Err(InconsistentCacheState::new(event));
                };
                let new_week = week_start.week_of(entry.period_start);
                if new_week == old_week {
                    self.replace_in_place(old_week, entry.clone())
                        .ok_or_else(|| InconsistentCacheState::new(event))?;
                } else {
                    self.remove(&entry.id)
                        .ok_or_else(|| InconsistentCacheState::new(event))?;
                    self.insert(entry.clone(), week_start);
                }
            }
            ChangeEvent::Delete { id } => {
                self.remove(id)
                    .ok_or_else(|| InconsistentCacheState::new(event))?;
            }
        }
        Ok(())
    }

    fn position(&self, week: NaiveDate) -> Result<usize, usize> {
        // Descending by week start.
        self.buckets
            .binary_search_by(|b| week.cmp(&b.week_start))
    }

    fn insert(&mut self, entry: Entry, week_start: WeekStart) {
        let (start, end) = week_start.week_bounds(entry.period_start);
        let slot = match self.position(start) {
            Ok(slot) => slot,
            Err(slot) => {
                self.buckets.insert(slot, WeekBucket::new(start, end));
                slot
            }
        };
        self.locations.insert(entry.id.clone(), start);
        self.buckets[slot].push(entry);
    }

    fn replace_in_place(&mut self, week: NaiveDate, entry: Entry) -> Option<()> {
        let slot = self.position(week).ok()?;
        let bucket = &mut self.buckets[slot];
        let member = bucket.position_of(&entry.id)?;
        bucket.entries[member] = entry;
        bucket.refold();
        Some(())
    }

    fn remove(&mut self, id: &str) -> Option<Entry> {
        let week = *self.locations.get(id)?;
        let slot = self.position(week).ok()?;
        let member = self.buckets[slot].position_of(id)?;

        self.locations.remove(id);
        let bucket = &mut self.buckets[slot];
        let removed = bucket.entries.remove(member);
        if bucket.is_empty() {
            self.buckets.remove(slot);
        } else {
            bucket.refold();
        }
        Some(removed)
    }
}

enum CacheState {
    Ready(WeekCache),
    /// The last full read failed; reads fail closed until a refresh succeeds.
    Stale(String),
}

/// One owner's live aggregation view.
///
/// Pending change events are applied, in delivery order, before every read and
/// on explicit [`LiveAggregation::sync`] calls.
pub struct LiveAggregation {
    owner_id: String,
    week_start: WeekStart,
    store: EntryStore,
    feed: Mutex<Subscription>,
    cache: RwLock<CacheState>,
}

impl LiveAggregation {
    /// Subscribes to the owner's changes, then performs the initial full read.
    pub fn open(store: EntryStore, owner_id: &str, week_start: WeekStart) -> AppResult<Self> {
        let subscription = store.subscribe(owner_id);
        let entries = store.list_entries(owner_id, &EntryFilter::default())?;
        let cache = WeekCache::build(&entries, week_start);
        info!(
            owner_id,
            entries = entries.len(),
            weeks = cache.buckets.len(),
            "Opened live aggregation"
        );

        Ok(Self {
            owner_id: owner_id.to_string(),
            week_start,
            store,
            feed: Mutex::new(subscription),
            cache: RwLock::new(CacheState::Ready(cache)),
        })
    }

    /// Applies every change delivered so far. Returns the number of events seen.
    pub fn sync(&self) -> AppResult<usize> {
        let mut feed = self.lock_feed();
        trace!(owner_id = %self.owner_id, pending = feed.pending(), "Syncing live view");
        if feed.take_overflow() {
            warn!(
                owner_id = %self.owner_id,
                "Change queue overflowed, falling back to full re-aggregation"
            );
            self.reload(&feed);
        }

        let mut seen = 0;
        while let Some(event) = feed.try_next() {
            seen += 1;
            let outcome = match &mut *self.write_cache() {
                CacheState::Ready(cache) => cache.apply(&event, self.week_start),
                // A refresh below reads everything this event changed.
                CacheState::Stale(_) => Ok(()),
            };
            match outcome {
                Ok(()) => debug!(
                    owner_id = %self.owner_id,
                    kind = event.kind(),
                    entry_id = event.entry_id(),
                    "Applied change to cached weeks"
                ),
                Err(inconsistent) => {
                    warn!(
                        owner_id = %self.owner_id,
                        error = %inconsistent,
                        "Falling back to full re-aggregation"
                    );
                    self.reload(&feed);
                }
            }
        }

        if matches!(*self.read_cache(), CacheState::Stale(_)) {
            self.reload(&feed);
        }
        Ok(seen)
    }

    /// Discards the cache and rebuilds it from a full store read.
    pub fn refresh(&self) -> AppResult<()> {
        let feed = self.lock_feed();
        self.reload(&feed);
        match &*self.read_cache() {
            CacheState::Ready(_) => Ok(()),
            CacheState::Stale(reason) => Err(AppError::StoreUnavailable(reason.clone())),
        }
    }

    // Callers hold the feed lock so reloads never interleave with event application.
    fn reload(&self, _feed: &MutexGuard<'_, Subscription>) {
        let next = match self
            .store
            .list_entries(&self.owner_id, &EntryFilter::default())
        {
            Ok(entries) => {
                info!(
                    owner_id = %self.owner_id,
                    entries = entries.len(),
                    "Re-aggregated from store"
                );
                CacheState::Ready(WeekCache::build(&entries, self.week_start))
            }
            Err(e) => {
                warn!(owner_id = %self.owner_id, error = %e, "Store read failed, cache is stale");
                CacheState::Stale(e.to_string())
            }
        };
        *self.write_cache() = next;
        self.cache.clear_poison();
    }

    /// Runs `f` against the synced cache, failing closed when it is stale.
    fn with_cache<T>(&self, f: impl FnOnce(&WeekCache) -> T) -> AppResult<T> {
        self.sync()?;
        match &*self.read_cache() {
            CacheState::Ready(cache) => Ok(f(cache)),
            CacheState::Stale(reason) => Err(AppError::StoreUnavailable(reason.clone())),
        }
    }

    pub fn week_buckets(&self) -> AppResult<Vec<WeekBucket>> {
        self.with_cache(|c| c.buckets.clone())
    }

    pub fn period_summaries(&self, group_size: usize) -> AppResult<Vec<PeriodSummary>> {
        self.with_cache(|c| combine(&c.buckets, group_size))
    }

    /// Week-over-week income change in percent, `None` when undefined.
    pub fn trend(&self) -> AppResult<Option<f64>> {
        self.with_cache(|c| metrics::trend(&c.buckets))
    }

    pub fn average_hourly_rate(&self) -> AppResult<f64> {
        self.with_cache(|c| metrics::hourly_rate(&metrics::overall_totals(&c.buckets)))
    }

    /// Stats and both trends computed from a single synced state.
    pub fn stats_report(&self, group_size: usize) -> AppResult<StatsReport> {
        self.with_cache(|c| metrics::stats_report(&c.buckets, group_size))
    }

    pub fn income_split(&self, window: Option<usize>) -> AppResult<IncomeSplit> {
        self.with_cache(|c| metrics::income_split(&c.buckets, window))
    }

    pub fn chart(&self, weeks: usize) -> AppResult<Vec<ChartPoint>> {
        self.with_cache(|c| metrics::chart_points(&c.buckets, weeks))
    }

    /// Cache writes only happen under the feed lock, so a panic during one
    /// poisons this lock too. Recovery drops the backlog and rebuilds.
    fn lock_feed(&self) -> MutexGuard<'_, Subscription> {
        match self.feed.lock() {
            Ok(feed) => feed,
            Err(poisoned) => {
                warn!(owner_id = %self.owner_id, "Live feed lock poisoned, re-aggregating");
                let mut feed = poisoned.into_inner();
                self.feed.clear_poison();
                feed.take_overflow();
                while feed.try_next().is_some() {}
                self.reload(&feed);
                feed
            }
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, CacheState> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Live views shared by all request handlers, one per owner.
#[derive(Clone)]
pub struct LiveViews {
    store: EntryStore,
    week_start: WeekStart,
    views: Arc<Mutex<HashMap<String, Arc<LiveAggregation>>>>,
}

impl LiveViews {
    pub fn new(store: EntryStore, week_start: WeekStart) -> Self {
        Self {
            store,
            week_start,
            views: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The owner's view, opened on first use.
    pub fn view(&self, owner_id: &str) -> AppResult<Arc<LiveAggregation>> {
        let mut views = self
            .views
            .lock()
            .map_err(|_| AppError::Internal("live view registry lock poisoned".into()))?;
        if let Some(view) = views.get(owner_id) {
            return Ok(Arc::clone(view));
        }
        let view = Arc::new(LiveAggregation::open(
            self.store.clone(),
            owner_id,
            self.week_start,
        )?);
        views.insert(owner_id.to_string(), Arc::clone(&view));
        Ok(view)
    }

    /// Drops the registry's view. Its subscription is released once no handler
    /// still holds the view.
    pub fn release(&self, owner_id: &str) -> bool {
        let removed = self
            .views
            .lock()
            .map(|mut views| views.remove(owner_id).is_some())
            .unwrap_or(false);
        if removed {
            info!(owner_id, "Released live aggregation");
        }
        removed
    }

    pub fn open_count(&self) -> usize {
        self.views.lock().map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_in_memory_pool, migrations, DbPool};
    use crate::models::{EntryPatch, NewEntry};
    use crate::services::test_support::{d, entry};
    use std::path::Path;

    fn ws() -> WeekStart {
        WeekStart::default()
    }

    fn pool() -> DbPool {
        let pool = create_in_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            migrations::run_migrations(&conn, Path::new("migrations")).unwrap();
        }
        pool
    }

    fn store() -> EntryStore {
        EntryStore::new(pool())
    }

    fn assert_matches_store(view: &LiveAggregation, store: &EntryStore) {
        let fresh_entries = store.list_entries("alice", &EntryFilter::default()).unwrap();
        let fresh = aggregate(&fresh_entries, ws());
        let live = view.week_buckets().unwrap();
        assert_eq!(live.len(), fresh.len());
        for (l, f) in live.iter().zip(&fresh) {
            assert_eq!(l.week_start, f.week_start);
            assert!((l.totals.total_income - f.totals.total_income).abs() < 1e-9);
            assert_eq!(l.entries.len(), f.entries.len());
        }
    }

    fn seeded_entries() -> Vec<Entry> {
        vec![
            entry("a", "2024-01-16", 8.0, 200.0, 20.0),
            entry("b", "2024-01-03", 8.0, 200.0, 10.0),
            entry("c", "2024-01-01", 0.1, 0.1, 0.2),
        ]
    }

    fn seeded_cache() -> WeekCache {
        WeekCache::build(&seeded_entries(), ws())
    }

    #[test]
    fn test_insert_then_delete_restores_cache() {
        let before = seeded_cache();
        let mut cache = before.clone();

        for (id, date) in [("x", "2024-01-02"), ("y", "2024-02-20")] {
            let e = entry(id, date, 0.3, 0.7, 0.1);
            cache.apply(&ChangeEvent::Insert(e), ws()).unwrap();
            assert_ne!(cache, before);
            cache
                .apply(&ChangeEvent::Delete { id: id.into() }, ws())
                .unwrap();
            assert_eq!(cache, before);
        }
    }

    #[test]
    fn test_insert_into_existing_and_new_weeks() {
        let mut cache = seeded_cache();
        cache
            .apply(&ChangeEvent::Insert(entry("x", "2024-01-05", 2.0, 50.0, 5.0)), ws())
            .unwrap();
        let week = &cache.buckets()[1];
        assert_eq!(week.week_start, d("2023-12-31"));
        assert_eq!(week.entries.last().map(|e| e.id.as_str()), Some("x"));
        assert!((week.totals.total_tips - 15.2).abs() < 1e-9);

        cache
            .apply(&ChangeEvent::Insert(entry("y", "2024-01-09", 1.0, 10.0, 0.0)), ws())
            .unwrap();
        let starts: Vec<_> = cache.buckets().iter().map(|b| b.week_start).collect();
        assert_eq!(starts, vec![d("2024-01-14"), d("2024-01-07"), d("2023-12-31")]);
    }

    #[test]
    fn test_update_same_week_replaces_in_place() {
        let mut entries = seeded_entries();
        let mut cache = WeekCache::build(&entries, ws());

        let mut changed = entry("b", "2024-01-04", 6.0, 150.0, 40.0);
        changed.note = Some("moved a day".into());
        cache
            .apply(&ChangeEvent::Update(changed.clone()), ws())
            .unwrap();

        let week = &cache.buckets()[1];
        let ids: Vec<_> = week.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(week.entries[0].note.as_deref(), Some("moved a day"));

        entries[1] = changed;
        assert_eq!(cache, WeekCache::build(&entries, ws()));
    }

    #[test]
    fn test_update_across_weeks_moves_entry() {
        let mut cache = seeded_cache();
        cache
            .apply(&ChangeEvent::Update(entry("a", "2024-01-02", 8.0, 200.0, 20.0)), ws())
            .unwrap();

        assert_eq!(cache.buckets().len(), 1, "emptied week is dropped");
        let week = &cache.buckets()[0];
        assert_eq!(week.entries.len(), 3);
        assert!((week.totals.total_hours - 16.1).abs() < 1e-9);
        assert!(week.contains(d("2024-01-02")));
    }

    #[test]
    fn test_delete_only_entry_drops_bucket() {
        let mut cache = seeded_cache();
        cache
            .apply(&ChangeEvent::Delete { id: "a".into() }, ws())
            .unwrap();
        assert!(cache
            .buckets()
            .iter()
            .all(|b| b.week_start != d("2024-01-14")));
        assert!(!cache.contains_entry("a"));
    }

    #[test]
    fn test_unknown_prior_state_is_rejected_untouched() {
        let mut cache = seeded_cache();
        let before = cache.clone();

        let err = cache
            .apply(&ChangeEvent::Delete { id: "ghost".into() }, ws())
            .unwrap_err();
        assert_eq!(err.entry_id, "ghost");
        assert!(cache
            .apply(&ChangeEvent::Update(entry("ghost", "2024-01-01", 1.0, 1.0, 0.0)), ws())
            .is_err());
        assert!(cache
            .apply(&ChangeEvent::Insert(entry("a", "2024-01-16", 1.0, 1.0, 0.0)), ws())
            .is_err());
        assert_eq!(cache, before);
    }

    #[test]
    fn test_live_view_tracks_store_mutations() {
        let store = store();
        let view = LiveAggregation::open(store.clone(), "alice", ws()).unwrap();
        assert!(view.week_buckets().unwrap().is_empty());

        let first = store
            .insert_entry("alice", NewEntry::new(d("2024-01-01"), 8.0, 200.0).with_tips(20.0))
            .unwrap();
        store
            .insert_entry("alice", NewEntry::new(d("2024-01-03"), 8.0, 200.0).with_tips(10.0))
            .unwrap();

        let weeks = view.week_buckets().unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].week_start, d("2023-12-31"));
        assert_eq!(weeks[0].totals.total_income, 430.0);

        let patch = EntryPatch {
            period_start: Some(d("2024-01-08")),
            period_end: Some(d("2024-01-08")),
            ..Default::default()
        };
        store.update_entry("alice", &first.id, &patch).unwrap();
        let weeks = view.week_buckets().unwrap();
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week_start, d("2024-01-07"));
        assert_eq!(view.trend().unwrap(), Some(((220.0 - 210.0) / 210.0) * 100.0));

        store.delete_entry("alice", &first.id).unwrap();
        let weeks = view.week_buckets().unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(view.trend().unwrap(), None);
        assert_eq!(view.average_hourly_rate().unwrap(), 210.0 / 8.0);
    }

    #[test]
    fn test_view_matches_fresh_aggregation_after_many_changes() {
        let store = store();
        let view = LiveAggregation::open(store.clone(), "alice", ws()).unwrap();

        let mut ids = Vec::new();
        for day in 0..20i64 {
            let date = d("2024-01-01") + chrono::Duration::days(day * 2);
            let e = store
                .insert_entry("alice", NewEntry::new(date, 1.25, 30.1).with_tips(day as f64 * 0.1))
                .unwrap();
            ids.push(e.id);
        }
        for id in ids.iter().step_by(3) {
            store.delete_entry("alice", id).unwrap();
        }
        let patch = EntryPatch {
            tips_amount: Some(0.3),
            ..Default::default()
        };
        store.update_entry("alice", &ids[1], &patch).unwrap();

        let live: Vec<_> = view.week_buckets().unwrap();
        let fresh_entries = store.list_entries("alice", &EntryFilter::default()).unwrap();
        let fresh = aggregate(&fresh_entries, ws());

        assert_eq!(live.len(), fresh.len());
        for (l, f) in live.iter().zip(&fresh) {
            assert_eq!(l.week_start, f.week_start);
            assert!((l.totals.total_income - f.totals.total_income).abs() < 1e-9);
            let mut l_ids: Vec<_> = l.entries.iter().map(|e| &e.id).collect();
            let mut f_ids: Vec<_> = f.entries.iter().map(|e| &e.id).collect();
            l_ids.sort();
            f_ids.sort();
            assert_eq!(l_ids, f_ids);
        }
    }

    #[test]
    fn test_changes_before_initial_read_fall_back_to_refresh() {
        let store = store();
        let existing = store
            .insert_entry("alice", NewEntry::new(d("2024-01-01"), 1.0, 10.0))
            .unwrap();
        let view = LiveAggregation::open(store.clone(), "alice", ws()).unwrap();

        // A notification for a row the initial read never saw.
        store.feed().publish(
            "alice",
            ChangeEvent::Delete {
                id: "not-cached".into(),
            },
        );

        assert_eq!(view.sync().unwrap(), 1);
        let weeks = view.week_buckets().unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].entries[0].id, existing.id);
    }

    #[test]
    fn test_two_sessions_observe_each_others_writes() {
        let store = store();
        let tab_one = LiveAggregation::open(store.clone(), "alice", ws()).unwrap();
        let tab_two = LiveAggregation::open(store.clone(), "alice", ws()).unwrap();
        assert_eq!(store.feed().subscriber_count("alice"), 2);

        store
            .insert_entry("alice", NewEntry::new(d("2024-01-01"), 4.0, 100.0))
            .unwrap();
        assert_eq!(tab_one.week_buckets().unwrap(), tab_two.week_buckets().unwrap());

        drop(tab_one);
        assert_eq!(store.feed().subscriber_count("alice"), 1);
        drop(tab_two);
        assert!(!store.feed().has_channel("alice"));
    }

    #[test]
    fn test_period_summaries_from_view() {
        let store = store();
        for date in ["2024-01-02", "2024-01-09", "2024-01-16"] {
            store
                .insert_entry("alice", NewEntry::new(d(date), 5.0, 100.0))
                .unwrap();
        }
        let view = LiveAggregation::open(store, "alice", ws()).unwrap();
        let periods = view.period_summaries(2).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].totals.total_income, 200.0);
        assert_eq!(periods[0].start, d("2024-01-07"));
        assert_eq!(periods[0].end, d("2024-01-20"));
    }

    #[test]
    fn test_registry_shares_and_releases_views() {
        let store = store();
        let views = LiveViews::new(store.clone(), ws());

        let first = views.view("alice").unwrap();
        let again = views.view("alice").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(views.open_count(), 1);
        assert_eq!(store.feed().subscriber_count("alice"), 1);

        assert!(views.release("alice"));
        assert!(!views.release("alice"));
        assert!(store.feed().has_channel("alice"), "handlers still hold the view");
        drop(first);
        drop(again);
        assert!(!store.feed().has_channel("alice"));
    }

    #[test]
    fn test_overflowed_queue_falls_back_to_full_read() {
        let store = EntryStore::with_queue_capacity(pool(), 4);
        let view = LiveAggregation::open(store.clone(), "alice", ws()).unwrap();

        let mut ids = Vec::new();
        for day in 0..25u64 {
            let date = d("2024-01-01") + chrono::Days::new(day);
            let e = store
                .insert_entry("alice", NewEntry::new(date, 1.0, 10.0))
                .unwrap();
            ids.push(e.id);
        }
        for id in &ids[..10] {
            store.delete_entry("alice", id).unwrap();
        }
        assert!(view.feed.lock().unwrap().pending() <= 4, "queue stays bounded");

        assert_matches_store(&view, &store);
        assert_eq!(view.feed.lock().unwrap().pending(), 0);
        assert_eq!(view.stats_report(2).unwrap().stats.total_entries, 15);
    }

    #[test]
    fn test_poisoned_view_recovers_on_next_read() {
        let store = store();
        let view = Arc::new(LiveAggregation::open(store.clone(), "alice", ws()).unwrap());
        store
            .insert_entry("alice", NewEntry::new(d("2024-01-01"), 8.0, 200.0))
            .unwrap();

        let crashing = Arc::clone(&view);
        let outcome = std::thread::spawn(move || {
            let _feed = crashing.feed.lock().unwrap();
            let _cache = crashing.cache.write().unwrap();
            panic!("crash while applying a change");
        })
        .join();
        assert!(outcome.is_err());
        assert!(view.feed.is_poisoned());

        store
            .insert_entry("alice", NewEntry::new(d("2024-01-09"), 4.0, 100.0))
            .unwrap();
        let weeks = view.week_buckets().unwrap();
        assert_eq!(weeks.len(), 2);
        assert!(!view.feed.is_poisoned());
        assert!(!view.cache.is_poisoned());
        assert_matches_store(&view, &store);
    }

    #[test]
    fn test_failed_rebuild_fails_closed() {
        let pool = pool();
        let store = EntryStore::new(pool.clone());
        store
            .insert_entry("alice", NewEntry::new(d("2024-01-01"), 8.0, 200.0))
            .unwrap();
        let view = LiveAggregation::open(store.clone(), "alice", ws()).unwrap();
        assert_eq!(view.week_buckets().unwrap().len(), 1);

        pool.get().unwrap().execute_batch("DROP TABLE entries").unwrap();
        store
            .feed()
            .publish("alice", ChangeEvent::Delete { id: "ghost".into() });

        assert!(matches!(view.week_buckets(), Err(AppError::StoreUnavailable(_))));
        assert!(matches!(view.trend(), Err(AppError::StoreUnavailable(_))));
        assert!(view.refresh().is_err());
    }
}

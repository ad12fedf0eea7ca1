//! An owner's daily hours list, kept current from the daily hours change feed.
//!
//! Any delivered change triggers a full refetch of the owner's days.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{DailyHours, DailyHoursSummary};
use crate::store::{DailyHoursStore, Subscription};

enum LogState {
    Ready(DailyHoursSummary),
    Stale(String),
}

pub struct DailyLog {
    owner_id: String,
    store: DailyHoursStore,
    feed: Mutex<Subscription<DailyHours>>,
    state: RwLock<LogState>,
}

impl DailyLog {
    /// Subscribes first so no change between the read and the subscription is lost.
    pub fn open(store: DailyHoursStore, owner_id: &str) -> AppResult<Self> {
        let subscription = store.subscribe(owner_id);
        let days = store.list(owner_id)?;
        info!(owner_id, days = days.len(), "Opened daily hours log");

        Ok(Self {
            owner_id: owner_id.to_string(),
            store,
            feed: Mutex::new(subscription),
            state: RwLock::new(LogState::Ready(DailyHoursSummary::of(days))),
        })
    }

    /// Takes every delivered change and refetches when there was any. Returns
    /// the number of changes seen.
    pub fn sync(&self) -> usize {
        let (mut feed, recovered) = self.lock_feed();
        let overflowed = feed.take_overflow();
        let mut seen = 0;
        while feed.try_next().is_some() {
            seen += 1;
        }

        let stale = matches!(
            *self.state.read().unwrap_or_else(|e| e.into_inner()),
            LogState::Stale(_)
        );
        if recovered || overflowed || stale || seen > 0 {
            self.reload(&feed);
        }
        seen
    }

    pub fn summary(&self) -> AppResult<DailyHoursSummary> {
        self.sync();
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            LogState::Ready(summary) => Ok(summary.clone()),
            LogState::Stale(reason) => Err(AppError::StoreUnavailable(reason.clone())),
        }
    }

    fn lock_feed(&self) -> (MutexGuard<'_, Subscription<DailyHours>>, bool) {
        match self.feed.lock() {
            Ok(feed) => (feed, false),
            Err(poisoned) => {
                warn!(owner_id = %self.owner_id, "Daily hours feed lock poisoned, refetching");
                self.feed.clear_poison();
                (poisoned.into_inner(), true)
            }
        }
    }

    fn reload(&self, _feed: &MutexGuard<'_, Subscription<DailyHours>>) {
        let next = match self.store.list(&self.owner_id) {
            Ok(days) => {
                debug!(owner_id = %self.owner_id, days = days.len(), "Refetched daily hours");
                LogState::Ready(DailyHoursSummary::of(days))
            }
            Err(e) => {
                warn!(owner_id = %self.owner_id, error = %e, "Daily hours read failed");
                LogState::Stale(e.to_string())
            }
        };
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = next;
        self.state.clear_poison();
    }
}

/// Daily hours logs shared by all request handlers, one per owner.
#[derive(Clone)]
pub struct DailyLogs {
    store: DailyHoursStore,
    logs: Arc<Mutex<HashMap<String, Arc<DailyLog>>>>,
}

impl DailyLogs {
    pub fn new(store: DailyHoursStore) -> Self {
        Self {
            store,
            logs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn log(&self, owner_id: &str) -> AppResult<Arc<DailyLog>> {
        let mut logs = self
            .logs
            .lock()
            .map_err(|_| AppError::Internal("daily log registry lock poisoned".into()))?;
        if let Some(log) = logs.get(owner_id) {
            return Ok(Arc::clone(log));
        }
        let log = Arc::new(DailyLog::open(self.store.clone(), owner_id)?);
        logs.insert(owner_id.to_string(), Arc::clone(&log));
        Ok(log)
    }

    pub fn release(&self, owner_id: &str) -> bool {
        self.logs
            .lock()
            .map(|mut logs| logs.remove(owner_id).is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_in_memory_pool, migrations, DbPool};
    use crate::models::{DailyHoursPatch, NewDailyHours};
    use crate::services::test_support::d;
    use std::path::Path;

    fn pool() -> DbPool {
        let pool = create_in_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            migrations::run_migrations(&conn, Path::new("migrations")).unwrap();
        }
        pool
    }

    #[test]
    fn test_log_follows_store_changes() {
        let store = DailyHoursStore::new(pool());
        let log = DailyLog::open(store.clone(), "alice").unwrap();
        assert_eq!(log.summary().unwrap().total_hours, 0.0);

        let first = store
            .insert("alice", NewDailyHours::new(d("2024-03-01"), 6.0))
            .unwrap();
        store
            .insert("alice", NewDailyHours::new(d("2024-03-02"), 7.5))
            .unwrap();
        store
            .insert("bob", NewDailyHours::new(d("2024-03-02"), 3.0))
            .unwrap();

        let summary = log.summary().unwrap();
        assert_eq!(summary.total_hours, 13.5);
        assert_eq!(summary.days[0].date, d("2024-03-02"));

        let patch = DailyHoursPatch {
            hours_worked: Some(8.0),
            ..Default::default()
        };
        store.update("alice", &first.id, &patch).unwrap();
        assert_eq!(log.summary().unwrap().total_hours, 15.5);

        store.delete("alice", &first.id).unwrap();
        assert_eq!(log.sync(), 1);
        assert_eq!(log.summary().unwrap().days.len(), 1);
    }

    #[test]
    fn test_overflow_triggers_refetch() {
        let store = DailyHoursStore::with_queue_capacity(pool(), 2);
        let log = DailyLog::open(store.clone(), "alice").unwrap();
        for day in 1..=9 {
            let date = d("2024-03-01") + chrono::Days::new(day);
            store.insert("alice", NewDailyHours::new(date, 1.0)).unwrap();
        }
        let summary = log.summary().unwrap();
        assert_eq!(summary.days.len(), 9);
        assert_eq!(summary.total_hours, 9.0);
    }

    #[test]
    fn test_failed_refetch_fails_closed() {
        let pool = pool();
        let store = DailyHoursStore::new(pool.clone());
        let log = DailyLog::open(store.clone(), "alice").unwrap();
        store
            .insert("alice", NewDailyHours::new(d("2024-03-01"), 6.0))
            .unwrap();
        pool.get().unwrap().execute_batch("DROP TABLE daily_hours").unwrap();

        assert!(matches!(log.summary(), Err(AppError::StoreUnavailable(_))));
    }

    #[test]
    fn test_registry_releases_subscription() {
        let store = DailyHoursStore::new(pool());
        let logs = DailyLogs::new(store.clone());
        let log = logs.log("alice").unwrap();
        assert!(Arc::ptr_eq(&log, &logs.log("alice").unwrap()));
        assert_eq!(store.feed().subscriber_count("alice"), 1);

        assert!(logs.release("alice"));
        drop(log);
        assert!(!store.feed().has_channel("alice"));
    }
}

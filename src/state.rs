use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::daily_log::DailyLogs;
use crate::services::live::LiveViews;
use crate::store::{DailyHoursStore, EntryStore};

#[derive(Clone)]
pub struct AppState {
    pub store: EntryStore,
    pub daily_hours: DailyHoursStore,
    pub config: Arc<Config>,
    pub live: LiveViews,
    pub daily_logs: DailyLogs,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let store = EntryStore::with_queue_capacity(db.clone(), config.feed_capacity);
        let daily_hours = DailyHoursStore::with_queue_capacity(db, config.feed_capacity);
        let live = LiveViews::new(store.clone(), config.week_start);
        let daily_logs = DailyLogs::new(daily_hours.clone());
        Self {
            store,
            daily_hours,
            config: Arc::new(config),
            live,
            daily_logs,
        }
    }
}

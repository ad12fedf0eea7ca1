//! Validated persistence of entries and daily hours, plus the owner-scoped
//! change feeds that live views subscribe to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::db::queries::daily_hours;
use crate::db::queries::entries::{self, EntryFilter};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    ChangeEvent, DailyHours, DailyHoursPatch, Entry, EntryPatch, NewDailyHours, NewEntry, Record,
};

/// Events a subscriber may have waiting before the feed starts dropping them.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct Subscriber<T> {
    tx: mpsc::Sender<ChangeEvent<T>>,
    overflowed: Arc<AtomicBool>,
}

struct OwnerChannel<T> {
    subscribers: HashMap<u64, Subscriber<T>>,
}

struct FeedInner<T> {
    next_id: u64,
    owners: HashMap<String, OwnerChannel<T>>,
}

/// Fan-out of committed mutations to the subscribers of each owner.
///
/// An owner's channel exists only while it has at least one subscriber. Each
/// subscriber queues at most `capacity` events; past that, events are dropped
/// and the subscription is flagged so its reader rebuilds from the store.
pub struct ChangeFeed<T = Entry> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<FeedInner<T>>,
}

impl<T: Record> ChangeFeed<T> {
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            inner: Mutex::new(FeedInner {
                next_id: 0,
                owners: HashMap::new(),
            }),
        }
    }

    pub fn subscribe(self: &Arc<Self>, owner_id: &str) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let overflowed = Arc::new(AtomicBool::new(false));
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;

        let feed = self.name;
        let channel = inner
            .owners
            .entry(owner_id.to_string())
            .or_insert_with(|| {
                info!(feed, owner_id, "Opened change channel");
                OwnerChannel {
                    subscribers: HashMap::new(),
                }
            });
        channel.subscribers.insert(
            id,
            Subscriber {
                tx,
                overflowed: Arc::clone(&overflowed),
            },
        );
        debug!(
            feed,
            owner_id,
            subscribers = channel.subscribers.len(),
            "Subscriber acquired"
        );

        Subscription {
            owner_id: owner_id.to_string(),
            id,
            receiver: rx,
            overflowed,
            feed: Arc::clone(self),
        }
    }

    fn release(&self, owner_id: &str, id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let feed = self.name;
        let now_empty = match inner.owners.get_mut(owner_id) {
            Some(channel) => {
                channel.subscribers.remove(&id);
                debug!(
                    feed,
                    owner_id,
                    subscribers = channel.subscribers.len(),
                    "Subscriber released"
                );
                channel.subscribers.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.owners.remove(owner_id);
            info!(feed, owner_id, "Closed change channel");
        }
    }

    /// Delivers `event` to every current subscriber of `owner_id`.
    pub fn publish(&self, owner_id: &str, event: ChangeEvent<T>) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(channel) = inner.owners.get(owner_id) else {
            return;
        };
        debug!(
            feed = self.name,
            owner_id,
            kind = event.kind(),
            entry_id = event.entry_id(),
            subscribers = channel.subscribers.len(),
            "Publishing change"
        );
        for subscriber in channel.subscribers.values() {
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    if !subscriber.overflowed.swap(true, Ordering::AcqRel) {
                        warn!(
                            feed = self.name,
                            owner_id,
                            capacity = self.capacity,
                            "Subscriber queue full, dropping changes until it resyncs"
                        );
                    }
                }
                // A closed receiver is about to be released by its Drop.
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    pub fn subscriber_count(&self, owner_id: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .owners
            .get(owner_id)
            .map(|c| c.subscribers.len())
            .unwrap_or(0)
    }

    pub fn has_channel(&self, owner_id: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.owners.contains_key(owner_id)
    }
}

/// One subscriber's handle on an owner's change feed. Dropping it releases the
/// subscription.
pub struct Subscription<T: Record = Entry> {
    owner_id: String,
    id: u64,
    receiver: mpsc::Receiver<ChangeEvent<T>>,
    overflowed: Arc<AtomicBool>,
    feed: Arc<ChangeFeed<T>>,
}

impl<T: Record> Subscription<T> {
    /// Next already-delivered event, without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent<T>> {
        self.receiver.try_recv().ok()
    }

    /// Whether events were dropped since the last call. When they were, the
    /// queued backlog is discarded as well and the caller must reload.
    pub fn take_overflow(&mut self) -> bool {
        if !self.overflowed.swap(false, Ordering::AcqRel) {
            return false;
        }
        let mut discarded = 0;
        while self.receiver.try_recv().is_ok() {
            discarded += 1;
        }
        debug!(owner_id = %self.owner_id, discarded, "Discarded change backlog");
        true
    }

    /// Events queued and not yet taken.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl<T: Record> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.feed.release(&self.owner_id, self.id);
    }
}

/// Entry persistence for all owners, backed by the SQLite pool.
#[derive(Clone)]
pub struct EntryStore {
    db: DbPool,
    feed: Arc<ChangeFeed>,
    // Held across commit and publish so delivery order equals commit order.
    commit_lock: Arc<Mutex<()>>,
}

impl EntryStore {
    pub fn new(db: DbPool) -> Self {
        Self::with_queue_capacity(db, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(db: DbPool, capacity: usize) -> Self {
        Self {
            db,
            feed: Arc::new(ChangeFeed::with_capacity("entries", capacity)),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    pub fn subscribe(&self, owner_id: &str) -> Subscription {
        self.feed.subscribe(owner_id)
    }

    pub fn list_entries(&self, owner_id: &str, filter: &EntryFilter) -> AppResult<Vec<Entry>> {
        let conn = self.db.get()?;
        Ok(entries::list_entries(&conn, owner_id, filter)?)
    }

    pub fn count_entries(&self, owner_id: &str) -> AppResult<i64> {
        let conn = self.db.get()?;
        Ok(entries::count_entries(&conn, owner_id)?)
    }

    pub fn get_entry(&self, owner_id: &str, id: &str) -> AppResult<Entry> {
        let conn = self.db.get()?;
        entries::get_entry(&conn, owner_id, id)?
            .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))
    }

    pub fn insert_entry(&self, owner_id: &str, new_entry: NewEntry) -> AppResult<Entry> {
        let new_entry = new_entry.validate()?;
        let _commit = self.lock_commits()?;
        let entry = {
            let conn = self.db.get()?;
            entries::insert_entry(&conn, owner_id, &new_entry)?
        };
        self.feed.publish(owner_id, ChangeEvent::Insert(entry.clone()));
        Ok(entry)
    }

    pub fn update_entry(&self, owner_id: &str, id: &str, patch: &EntryPatch) -> AppResult<Entry> {
        let _commit = self.lock_commits()?;
        let entry = {
            let conn = self.db.get()?;
            let current = entries::get_entry(&conn, owner_id, id)?
                .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))?;
            if patch.is_empty() {
                return Ok(current);
            }
            let merged = patch.merge(&current)?;
            entries::update_entry(&conn, owner_id, id, &merged)?
                .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", id)))?
        };
        self.feed.publish(owner_id, ChangeEvent::Update(entry.clone()));
        Ok(entry)
    }

    pub fn delete_entry(&self, owner_id: &str, id: &str) -> AppResult<()> {
        let _commit = self.lock_commits()?;
        let deleted = {
            let conn = self.db.get()?;
            entries::delete_entry(&conn, owner_id, id)?
        };
        if !deleted {
            return Err(AppError::NotFound(format!("Entry {} not found", id)));
        }
        self.feed.publish(owner_id, ChangeEvent::Delete { id: id.to_string() });
        Ok(())
    }

    fn lock_commits(&self) -> AppResult<std::sync::MutexGuard<'_, ()>> {
        lock(&self.commit_lock)
    }
}

/// Daily hours persistence. It has its own change feed, separate from entries.
#[derive(Clone)]
pub struct DailyHoursStore {
    db: DbPool,
    feed: Arc<ChangeFeed<DailyHours>>,
    commit_lock: Arc<Mutex<()>>,
}

impl DailyHoursStore {
    pub fn new(db: DbPool) -> Self {
        Self::with_queue_capacity(db, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(db: DbPool, capacity: usize) -> Self {
        Self {
            db,
            feed: Arc::new(ChangeFeed::with_capacity("daily_hours", capacity)),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn feed(&self) -> &Arc<ChangeFeed<DailyHours>> {
        &self.feed
    }

    pub fn subscribe(&self, owner_id: &str) -> Subscription<DailyHours> {
        self.feed.subscribe(owner_id)
    }

    pub fn list(&self, owner_id: &str) -> AppResult<Vec<DailyHours>> {
        let conn = self.db.get()?;
        Ok(daily_hours::list_daily_hours(&conn, owner_id)?)
    }

    pub fn insert(&self, owner_id: &str, day: NewDailyHours) -> AppResult<DailyHours> {
        let day = day.validate()?;
        let _commit = lock(&self.commit_lock)?;
        let stored = {
            let conn = self.db.get()?;
            daily_hours::insert_daily_hours(&conn, owner_id, &day)?
        };
        self.feed.publish(owner_id, ChangeEvent::Insert(stored.clone()));
        Ok(stored)
    }

    pub fn update(&self, owner_id: &str, id: &str, patch: &DailyHoursPatch) -> AppResult<DailyHours> {
        let _commit = lock(&self.commit_lock)?;
        let stored = {
            let conn = self.db.get()?;
            let current = daily_hours::get_daily_hours(&conn, owner_id, id)?
                .ok_or_else(|| AppError::NotFound(format!("Daily hours {} not found", id)))?;
            if patch.is_empty() {
                return Ok(current);
            }
            let merged = patch.merge(&current)?;
            daily_hours::update_daily_hours(&conn, owner_id, id, &merged)?
                .ok_or_else(|| AppError::NotFound(format!("Daily hours {} not found", id)))?
        };
        self.feed.publish(owner_id, ChangeEvent::Update(stored.clone()));
        Ok(stored)
    }

    pub fn delete(&self, owner_id: &str, id: &str) -> AppResult<()> {
        let _commit = lock(&self.commit_lock)?;
        let deleted = {
            let conn = self.db.get()?;
            daily_hours::delete_daily_hours(&conn, owner_id, id)?
        };
        if !deleted {
            return Err(AppError::NotFound(format!("Daily hours {} not found", id)));
        }
        self.feed.publish(owner_id, ChangeEvent::Delete { id: id.to_string() });
        Ok(())
    }
}

fn lock(commit_lock: &Mutex<()>) -> AppResult<std::sync::MutexGuard<'_, ()>> {
    commit_lock
        .lock()
        .map_err(|_| AppError::Internal("store commit lock poisoned".into()))
}

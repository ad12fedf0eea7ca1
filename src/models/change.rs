use crate::models::entry::Entry;

/// A stored row that change events can name by id.
pub trait Record: Clone + Send + 'static {
    fn record_id(&self) -> &str;
}

impl Record for Entry {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A committed mutation of one owner's collection, as delivered by the store's
/// change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T = Entry> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

impl<T: Record> ChangeEvent<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert(_) => "insert",
            ChangeEvent::Update(_) => "update",
            ChangeEvent::Delete { .. } => "delete",
        }
    }

    pub fn entry_id(&self) -> &str {
        match self {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => row.record_id(),
            ChangeEvent::Delete { id } => id,
        }
    }
}

//! Typed FIFO queue over an element store.

use crate::codec::{JsonSerializer, Serializer};
use crate::config::{Config, QueueKind};
use crate::error::CoreResult;
use crate::factory;
use courier_storage::{ElementStore, InMemoryStore};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Records taken from the head of a queue in one peek.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    /// Records that decoded successfully, oldest first.
    pub items: Vec<T>,
    /// Raw records read from the store, malformed ones included.
    ///
    /// Removing `consumed` records after handling `items` drops malformed
    /// records together with the batch they arrived in.
    pub consumed: u64,
    /// The queue's clear count when the batch was read.
    pub generation: u64,
}

impl<T> Batch<T> {
    /// Returns true if no records were read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumed == 0
    }

    /// Number of records that failed to decode.
    #[must_use]
    pub fn malformed(&self) -> u64 {
        self.consumed - self.items.len() as u64
    }
}

/// A FIFO of typed records backed by an [`ElementStore`].
///
/// The backing store is chosen at construction and never changes. Records
/// that fail to decode are skipped by every read.
///
/// # Example
///
/// ```rust
/// use courier_core::{Event, TypedQueue};
///
/// let queue = TypedQueue::<Event>::in_memory("events");
/// queue.add(&Event::new("signup")).unwrap();
/// assert_eq!(queue.peek().unwrap().unwrap().event, "signup");
/// queue.remove_one().unwrap();
/// assert!(queue.is_empty());
/// ```
pub struct TypedQueue<T> {
    name: String,
    store: Arc<dyn ElementStore>,
    serializer: Box<dyn Serializer<T>>,
    generation: Mutex<u64>,
}

impl<T> fmt::Debug for TypedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedQueue")
            .field("name", &self.name)
            .field("size", &self.store.size())
            .field("durable", &self.store.is_durable())
            .finish()
    }
}

impl<T> TypedQueue<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Creates a JSON-encoded queue over an existing store.
    pub fn new(name: impl Into<String>, store: Arc<dyn ElementStore>) -> Self {
        Self::with_serializer(name, store, JsonSerializer::new())
    }

    /// Opens one of Courier's queues, falling back to memory if its file
    /// cannot be opened.
    pub fn open(config: &Config, kind: QueueKind) -> Self {
        Self::new(kind.file_name(), factory::open_queue_store(config, kind))
    }

    /// Creates a non-durable queue.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(InMemoryStore::new()))
    }
}

impl<T> TypedQueue<T> {
    /// Creates a queue with a custom serializer.
    pub fn with_serializer(
        name: impl Into<String>,
        store: Arc<dyn ElementStore>,
        serializer: impl Serializer<T> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            serializer: Box::new(serializer),
            generation: Mutex::new(0),
        }
    }

    /// Returns the queue's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ElementStore> {
        &self.store
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn add(&self, value: &T) -> CoreResult<()> {
        let bytes = self.serializer.encode(value)?;
        self.store.add(&bytes)?;
        Ok(())
    }

    /// Returns the oldest record if it decodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn peek(&self) -> CoreResult<Option<T>> {
        Ok(self.peek_batch(1)?.items.into_iter().next())
    }

    /// Returns up to `max` of the oldest records that decode.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn peek_many(&self, max: u64) -> CoreResult<Vec<T>> {
        Ok(self.peek_batch(max)?.items)
    }

    /// Reads up to `max` raw records and decodes them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn peek_batch(&self, max: u64) -> CoreResult<Batch<T>> {
        let generation = *self.generation.lock();
        let raw = self.store.peek_many(max)?;
        let consumed = raw.len() as u64;
        let items = raw
            .iter()
            .filter_map(|bytes| self.decode_or_skip(bytes))
            .collect();
        Ok(Batch {
            items,
            consumed,
            generation,
        })
    }

    /// Removes the records a batch consumed, unless the queue was cleared
    /// after the batch was read.
    ///
    /// Returns false if the batch was stale and nothing was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be updated.
    pub fn remove_batch(&self, generation: u64, consumed: u64) -> CoreResult<bool> {
        let current = self.generation.lock();
        if *current != generation {
            debug!(
                queue = %self.name,
                count = consumed,
                "queue cleared since batch was read, keeping records"
            );
            return Ok(false);
        }
        self.store.remove(consumed)?;
        Ok(true)
    }

    /// Removes the `n` oldest records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be updated.
    pub fn remove(&self, n: u64) -> CoreResult<()> {
        self.store.remove(n)?;
        Ok(())
    }

    /// Removes the oldest record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be updated.
    pub fn remove_one(&self) -> CoreResult<()> {
        self.remove(1)
    }

    /// Removes every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reset.
    pub fn clear(&self) -> CoreResult<()> {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.store.clear()?;
        Ok(())
    }

    /// Number of raw records, malformed ones included.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.store.size()
    }

    /// Returns true if the queue holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns true if the queue survives a restart.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.store.is_durable()
    }

    /// Iterates over the records that decode, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.store
            .iter()
            .filter_map(move |bytes| self.decode_or_skip(&bytes))
    }

    /// Collects every record that decodes.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    fn decode_or_skip(&self, bytes: &[u8]) -> Option<T> {
        match self.serializer.decode(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(queue = %self.name, error = %e, "skipping malformed record");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CborSerializer;
    use crate::model::Event;
    use courier_storage::{FileElementStore, StoreOptions};
    use tempfile::tempdir;

    fn event(name: &str) -> Event {
        Event::new(name).with_timestamp(1.0)
    }

    #[test]
    fn add_and_peek_in_order() {
        let queue = TypedQueue::<Event>::in_memory("events");
        queue.add(&event("a")).unwrap();
        queue.add(&event("b")).unwrap();

        assert_eq!(queue.size(), 2);
        assert_eq!(queue.peek().unwrap(), Some(event("a")));
        assert_eq!(queue.peek_many(5).unwrap(), vec![event("a"), event("b")]);
        assert!(!queue.is_durable());
    }

    #[test]
    fn malformed_records_are_skipped() {
        let store: Arc<dyn ElementStore> = Arc::new(InMemoryStore::with_entries(vec![
            b"garbage".to_vec(),
            serde_json::to_vec(&event("ok")).unwrap(),
            b"{\"truncated\":".to_vec(),
        ]));
        let queue = TypedQueue::<Event>::new("events", store);

        let batch = queue.peek_batch(10).unwrap();
        assert_eq!(batch.items, vec![event("ok")]);
        assert_eq!(batch.consumed, 3);
        assert_eq!(batch.malformed(), 2);

        assert_eq!(queue.to_vec(), vec![event("ok")]);
        assert_eq!(queue.size(), 3);
    }

    #[test]
    fn peek_skips_malformed_head() {
        let store: Arc<dyn ElementStore> =
            Arc::new(InMemoryStore::with_entries(vec![b"not json".to_vec()]));
        let queue = TypedQueue::<Event>::new("events", store);

        assert_eq!(queue.peek().unwrap(), None);
        assert!(!queue.is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let queue = TypedQueue::<Event>::in_memory("events");
        for name in ["a", "b", "c"] {
            queue.add(&event(name)).unwrap();
        }

        queue.remove_one().unwrap();
        assert_eq!(queue.peek().unwrap(), Some(event("b")));

        queue.clear().unwrap();
        assert!(queue.is_empty());
        assert!(queue.peek_batch(10).unwrap().is_empty());
    }

    #[test]
    fn stale_batch_is_not_removed_after_clear() {
        let queue = TypedQueue::<Event>::in_memory("events");
        queue.add(&event("old")).unwrap();
        let batch = queue.peek_batch(10).unwrap();

        queue.clear().unwrap();
        queue.add(&event("new")).unwrap();

        assert!(!queue.remove_batch(batch.generation, batch.consumed).unwrap());
        assert_eq!(queue.to_vec(), vec![event("new")]);

        let batch = queue.peek_batch(10).unwrap();
        assert!(queue.remove_batch(batch.generation, batch.consumed).unwrap());
        assert!(queue.is_empty());
    }

    #[test]
    fn durable_queue_with_cbor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events");

        {
            let store = Arc::new(FileElementStore::open(&path, StoreOptions::default()).unwrap());
            let queue = TypedQueue::with_serializer("events", store, CborSerializer::<Event>::new());
            queue.add(&event("persisted")).unwrap();
            assert!(queue.is_durable());
        }

        let store = Arc::new(FileElementStore::open(&path, StoreOptions::default()).unwrap());
        let queue = TypedQueue::with_serializer("events", store, CborSerializer::<Event>::new());
        assert_eq!(queue.to_vec(), vec![event("persisted")]);
    }
}

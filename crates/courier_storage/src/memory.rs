//! In-memory element store used as a fallback.

use crate::error::StorageResult;
use crate::store::{ElementIter, ElementStore};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// An in-memory element store.
///
/// Holds records in an ordered in-memory sequence. Nothing survives the
/// process; it exists so a queue keeps working when its backing file cannot
/// be created.
///
/// # Example
///
/// ```rust
/// use courier_storage::{ElementStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.add(b"test data").unwrap();
/// assert_eq!(store.size(), 1);
/// assert!(!store.is_durable());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<VecDeque<Vec<u8>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records, oldest first.
    #[must_use]
    pub fn with_entries(entries: Vec<Vec<u8>>) -> Self {
        Self {
            entries: Mutex::new(entries.into()),
        }
    }
}

impl ElementStore for InMemoryStore {
    fn size(&self) -> u64 {
        self.entries.lock().len() as u64
    }

    fn add(&self, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.entries.lock().push_back(data.to_vec());
        Ok(())
    }

    fn peek(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().front().cloned())
    }

    fn peek_many(&self, max: u64) -> StorageResult<Vec<Vec<u8>>> {
        let entries = self.entries.lock();
        let take = usize::try_from(max).unwrap_or(usize::MAX);
        Ok(entries.iter().take(take).cloned().collect())
    }

    fn remove(&self, n: u64) -> StorageResult<()> {
        let mut entries = self.entries.lock();
        let amount = usize::try_from(n).unwrap_or(usize::MAX).min(entries.len());
        entries.drain(..amount);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn iter(&self) -> ElementIter<'_> {
        let mut index = 0usize;
        Box::new(std::iter::from_fn(move || {
            let entry = self.entries.lock().get(index).cloned();
            index += 1;
            entry
        }))
    }

    fn is_durable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.size(), 0);
        assert!(store.is_empty());
        assert_eq!(store.peek().unwrap(), None);
    }

    #[test]
    fn memory_fifo_order() {
        let store = InMemoryStore::new();
        store.add(b"one").unwrap();
        store.add(b"two").unwrap();
        store.add(b"three").unwrap();

        assert_eq!(store.peek().unwrap(), Some(b"one".to_vec()));
        assert_eq!(
            store.peek_many(10).unwrap(),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
    }

    #[test]
    fn memory_peek_many_is_bounded() {
        let store = InMemoryStore::with_entries(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(store.peek_many(2).unwrap().len(), 2);
        assert_eq!(store.peek_many(0).unwrap().len(), 0);
    }

    #[test]
    fn memory_remove_clamps() {
        let store = InMemoryStore::with_entries(vec![b"a".to_vec(), b"b".to_vec()]);
        store.remove(1).unwrap();
        assert_eq!(store.peek().unwrap(), Some(b"b".to_vec()));

        store.remove(10).unwrap();
        assert!(store.is_empty());

        store.remove(1).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_clear() {
        let store = InMemoryStore::new();
        store.add(b"some data").unwrap();
        store.clear().unwrap();
        assert_eq!(store.size(), 0);
        store.clear().unwrap();
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn memory_iter_is_restartable() {
        let store = InMemoryStore::with_entries(vec![b"x".to_vec(), b"y".to_vec()]);
        let first: Vec<_> = store.iter().collect();
        let second: Vec<_> = store.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn memory_is_not_durable() {
        assert!(!InMemoryStore::new().is_durable());
    }
}

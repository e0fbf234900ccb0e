//! Element store trait definition.

use crate::error::StorageResult;

/// A lazy, forward-only iterator over the payloads of a store.
pub type ElementIter<'a> = Box<dyn Iterator<Item = Vec<u8>> + 'a>;

/// A FIFO of opaque byte records.
///
/// Element stores keep **opaque payloads**. They never interpret the bytes
/// they are given; the typed queue in `courier_core` owns encoding.
///
/// # Invariants
///
/// - Records come back from `peek`, `peek_many` and `iter` in the order
///   they were added
/// - `remove(n)` drops the `n` oldest records; `n` is clamped to `size()`
/// - `peek_many(max)` never returns more than `size()` records
/// - Every method takes `&self`; implementations serialize mutations
///   internally so a store can be shared across threads
///
/// # Implementors
///
/// - [`super::FileElementStore`] - Durable storage in a single file
/// - [`super::InMemoryStore`] - Non-durable fallback
pub trait ElementStore: Send + Sync {
    /// Returns the number of live records.
    fn size(&self) -> u64;

    /// Returns true if the store holds no records.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends a record at the tail.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn add(&self, data: &[u8]) -> StorageResult<()>;

    /// Returns the oldest record without removing it.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn peek(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Returns up to `max` of the oldest records without removing them.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn peek_many(&self, max: u64) -> StorageResult<Vec<Vec<u8>>>;

    /// Removes the `n` oldest records.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be removed.
    fn remove(&self, n: u64) -> StorageResult<()>;

    /// Removes every record and resets the store to its empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reset.
    fn clear(&self) -> StorageResult<()>;

    /// Returns an iterator over the records, oldest first.
    ///
    /// Each call starts again from the current head.
    fn iter(&self) -> ElementIter<'_>;

    /// Returns true if records survive a process restart.
    fn is_durable(&self) -> bool;
}

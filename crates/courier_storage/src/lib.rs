//! # Courier Storage
//!
//! Element stores for Courier queues.
//!
//! An element store is a FIFO of **opaque byte records**. It never looks
//! inside the payloads it keeps; typed encoding lives one layer up in
//! `courier_core`.
//!
//! ## Design Principles
//!
//! - Stores are strictly FIFO: add at the tail, peek and remove at the head
//! - One mutex per store serializes every mutation of its backing file
//! - Reads that fall outside the file are "not found", never a panic
//! - The header is rewritten only after the data it points at is written
//!
//! ## Available Stores
//!
//! - [`FileElementStore`] - Durable, single-file store that survives restarts
//! - [`InMemoryStore`] - Non-durable fallback with the same contract
//!
//! ## Example
//!
//! ```rust
//! use courier_storage::{ElementStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.add(b"hello").unwrap();
//! store.add(b"world").unwrap();
//! assert_eq!(store.peek().unwrap(), Some(b"hello".to_vec()));
//! store.remove(1).unwrap();
//! assert_eq!(store.size(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
pub mod format;
mod memory;
mod options;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::{FileElementStore, VerifyReport};
pub use format::{ElementDescriptor, FileHeader, DESCRIPTOR_LEN, FORMAT_VERSION, HEADER_LEN};
pub use memory::InMemoryStore;
pub use options::StoreOptions;
pub use store::{ElementIter, ElementStore};

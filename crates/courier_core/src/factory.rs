//! Store selection with in-memory fallback.

use crate::config::{Config, QueueKind};
use courier_storage::{ElementStore, FileElementStore, InMemoryStore, StoreOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens a file-backed store at `path`, or an in-memory store if the file
/// cannot be opened.
///
/// The choice is made once; callers that need to know which one they got
/// can ask [`ElementStore::is_durable`].
pub fn open_store(path: &Path, options: &StoreOptions) -> Arc<dyn ElementStore> {
    match FileElementStore::open_with_create_dirs(path, options.clone()) {
        Ok(store) => {
            debug!(path = %path.display(), "using file-backed queue");
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "cannot open queue file, falling back to in-memory queue"
            );
            Arc::new(InMemoryStore::new())
        }
    }
}

/// Opens the store for one of Courier's queues.
pub fn open_queue_store(config: &Config, kind: QueueKind) -> Arc<dyn ElementStore> {
    open_store(&config.queue_path(kind), &config.store)
}

//! Compact command implementation.

use super::{format_size, open_existing};
use courier_storage::{ElementStore, DESCRIPTOR_LEN, HEADER_LEN};
use std::path::Path;

/// Space before and after a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactResult {
    /// File length before.
    pub before: u64,
    /// File length after.
    pub after: u64,
}

impl CompactResult {
    /// Bytes returned to the file system.
    pub fn reclaimed(&self) -> u64 {
        self.before.saturating_sub(self.after)
    }
}

/// Compacts the queue file at `path`, or only measures it when `dry_run`.
pub fn compact(path: &Path, dry_run: bool) -> Result<CompactResult, Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let before = store.file_len()?;
    if dry_run {
        // An empty queue compacts down to the header and an empty descriptor.
        let after = if store.is_empty() {
            HEADER_LEN + DESCRIPTOR_LEN
        } else {
            store.used_bytes()
        };
        return Ok(CompactResult { before, after });
    }
    store.compact()?;
    Ok(CompactResult {
        before,
        after: store.file_len()?,
    })
}

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = compact(path, dry_run)?;
    if dry_run {
        println!(
            "Would reclaim {} ({} -> {})",
            format_size(result.reclaimed()),
            format_size(result.before),
            format_size(result.after)
        );
    } else {
        println!(
            "Reclaimed {} ({} -> {})",
            format_size(result.reclaimed()),
            format_size(result.before),
            format_size(result.after)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::queue_file;
    use courier_storage::{FileElementStore, StoreOptions};
    use tempfile::tempdir;

    #[test]
    fn compact_reclaims_removed_records() {
        let dir = tempdir().unwrap();
        let path = queue_file(dir.path(), &[b"aaaa", b"bbbb", b"cccc"]);
        {
            let store = FileElementStore::open(&path, StoreOptions::default()).unwrap();
            store.remove(2).unwrap();
        }

        let preview = compact(&path, true).unwrap();
        let result = compact(&path, false).unwrap();

        assert_eq!(preview, result);
        assert_eq!(result.after, HEADER_LEN + DESCRIPTOR_LEN + 4);
        assert_eq!(result.reclaimed(), 2 * (DESCRIPTOR_LEN + 4));

        let store = FileElementStore::open(&path, StoreOptions::default()).unwrap();
        assert_eq!(store.peek().unwrap(), Some(b"cccc".to_vec()));
    }
}

//! CLI command implementations.

pub mod clear;
pub mod compact;
pub mod dump;
pub mod inspect;
pub mod verify;

use courier_storage::{FileElementStore, StoreOptions};
use std::path::Path;
use tracing::debug;

/// Opens an existing queue file. Unlike the store itself, never creates one.
pub fn open_existing(path: &Path) -> Result<FileElementStore, Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("No queue file found at {:?}", path).into());
    }
    debug!(path = %path.display(), "opening queue file");
    Ok(FileElementStore::open(path, StoreOptions::default())?)
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

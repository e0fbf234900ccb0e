//! Inspect command implementation.

use super::{format_size, open_existing};
use courier_storage::{ElementStore, FileElementStore};
use serde::Serialize;
use std::path::Path;

/// Queue file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Queue file path.
    pub path: String,
    /// Format version from the header.
    pub version: u8,
    /// Number of live records.
    pub element_count: u64,
    /// Offset of the oldest record.
    pub first_offset: u64,
    /// Offset of the newest record.
    pub last_offset: u64,
    /// Length of the file on disk.
    pub file_len: u64,
    /// Bytes used by the header and live records.
    pub used_bytes: u64,
    /// Bytes a compaction would reclaim.
    pub reclaimable_bytes: u64,
    /// Whether the next add would compact the file first.
    pub would_compact: bool,
}

impl InspectResult {
    /// Collects the inspection result for an open store.
    pub fn collect(store: &FileElementStore) -> Result<Self, Box<dyn std::error::Error>> {
        let header = store.header();
        let file_len = store.file_len()?;
        let used_bytes = store.used_bytes();
        Ok(Self {
            path: store.path().display().to_string(),
            version: header.version,
            element_count: store.size(),
            first_offset: header.first_offset,
            last_offset: header.last_offset,
            file_len,
            used_bytes,
            reclaimable_bytes: file_len.saturating_sub(used_bytes),
            would_compact: store.options().should_compact(file_len, used_bytes),
        })
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let result = InspectResult::collect(&store)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Courier Queue Inspection");
    println!("========================");
    println!();
    println!("Path:    {}", result.path);
    println!("Version: {}", result.version);
    println!();
    println!("Records:");
    println!("  Count:        {}", result.element_count);
    println!("  First offset: {}", result.first_offset);
    println!("  Last offset:  {}", result.last_offset);
    println!();
    println!("Space:");
    println!("  File size:    {}", format_size(result.file_len));
    println!("  Used:         {}", format_size(result.used_bytes));
    println!("  Reclaimable:  {}", format_size(result.reclaimable_bytes));
    if result.would_compact {
        println!();
        println!("The next add will compact this file.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::queue_file;
    use courier_storage::{DESCRIPTOR_LEN, HEADER_LEN};
    use tempfile::tempdir;

    #[test]
    fn inspect_reports_header_and_space() {
        let dir = tempdir().unwrap();
        let path = queue_file(dir.path(), &[b"one", b"two"]);
        let store = open_existing(&path).unwrap();
        store.remove(1).unwrap();

        let result = InspectResult::collect(&store).unwrap();
        assert_eq!(result.element_count, 1);
        assert_eq!(result.first_offset, HEADER_LEN + DESCRIPTOR_LEN + 3);
        assert_eq!(result.first_offset, result.last_offset);
        assert_eq!(result.used_bytes, HEADER_LEN + DESCRIPTOR_LEN + 3);
        assert_eq!(result.reclaimable_bytes, DESCRIPTOR_LEN + 3);
        assert!(!result.would_compact);
    }

    #[test]
    fn inspect_json_has_stable_keys() {
        let dir = tempdir().unwrap();
        let path = queue_file(dir.path(), &[b"x"]);
        let result = InspectResult::collect(&open_existing(&path).unwrap()).unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["element_count"], 1);
        assert!(json.get("reclaimable_bytes").is_some());
    }
}

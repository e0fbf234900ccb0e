//! Clear command implementation.

use super::open_existing;
use courier_storage::ElementStore;
use std::path::Path;

/// Runs the clear command. Returns the number of records discarded.
pub fn run(path: &Path) -> Result<u64, Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let discarded = store.size();
    store.clear()?;
    println!("Discarded {} records from {:?}", discarded, path);
    Ok(discarded)
}

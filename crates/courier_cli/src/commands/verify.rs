//! Verify command implementation.

use super::{format_size, open_existing};
use std::path::Path;

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying queue file at {:?}", path);
    println!();

    let store = open_existing(path)?;
    let report = store.verify()?;

    println!("  Records in header: {}", report.element_count);
    println!("  Records walked:    {}", report.records_walked);
    println!("  Live data:         {}", format_size(report.live_bytes));
    println!("  File size:         {}", format_size(report.file_len));
    for error in &report.errors {
        println!("  ERROR: {}", error);
    }

    println!();
    if report.is_ok() {
        println!("✓ Queue verification passed");
        Ok(())
    } else {
        println!("✗ Queue verification failed");
        Err("Verification failed".into())
    }
}

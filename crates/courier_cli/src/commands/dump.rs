//! Dump command implementation.

use super::open_existing;
use courier_storage::ElementStore;
use serde::Serialize;
use std::path::Path;

/// One queued record as printed by `dump`.
#[derive(Debug, Serialize)]
pub struct DumpedRecord {
    /// Position from the head of the queue.
    pub index: u64,
    /// Payload length in bytes.
    pub length: usize,
    /// The payload parsed as JSON, when it is JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// The payload as lossy UTF-8, when it is not JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl DumpedRecord {
    fn new(index: u64, payload: &[u8]) -> Self {
        match serde_json::from_slice(payload) {
            Ok(value) => Self {
                index,
                length: payload.len(),
                value: Some(value),
                raw: None,
            },
            Err(_) => Self {
                index,
                length: payload.len(),
                value: None,
                raw: Some(String::from_utf8_lossy(payload).into_owned()),
            },
        }
    }
}

/// Reads up to `limit` records from the head of the queue.
pub fn collect(store: &dyn ElementStore, limit: Option<u64>) -> Vec<DumpedRecord> {
    let limit = limit.unwrap_or(u64::MAX);
    store
        .iter()
        .zip(0..limit)
        .map(|(payload, index)| DumpedRecord::new(index, &payload))
        .collect()
}

/// Runs the dump command.
pub fn run(path: &Path, limit: Option<u64>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let records = collect(&store, limit);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => {
            for record in &records {
                let body = match (&record.value, &record.raw) {
                    (Some(value), _) => value.to_string(),
                    (None, Some(raw)) => raw.clone(),
                    (None, None) => String::new(),
                };
                println!("[{}] {} bytes: {}", record.index, record.length, body);
            }
            println!();
            println!("{} of {} records", records.len(), store.size());
        }
    }
    Ok(())
}

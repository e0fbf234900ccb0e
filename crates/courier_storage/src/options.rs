//! Tuning options for file-backed stores.

/// Options controlling how a [`crate::FileElementStore`] manages its file.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// File length (bytes) above which compaction is considered.
    pub shrink_threshold: u64,

    /// Fraction of the file that must hold live records to skip compaction.
    pub load_factor: f64,

    /// Whether every write is followed by `sync_data`.
    pub sync_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            shrink_threshold: 4_000_000,
            load_factor: 0.75,
            sync_writes: true,
        }
    }
}

impl StoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compaction size threshold.
    #[must_use]
    pub const fn shrink_threshold(mut self, bytes: u64) -> Self {
        self.shrink_threshold = bytes;
        self
    }

    /// Sets the compaction load factor.
    #[must_use]
    pub const fn load_factor(mut self, factor: f64) -> Self {
        self.load_factor = factor;
        self
    }

    /// Sets whether writes are synced to stable storage.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Returns true if a file of `file_len` bytes holding `used` live bytes
    /// should be compacted before the next write.
    #[must_use]
    pub fn should_compact(&self, file_len: u64, used: u64) -> bool {
        let above_threshold = file_len > self.shrink_threshold;
        let under_loaded = (used as f64) < (file_len as f64) * self.load_factor;
        above_threshold && under_loaded
    }
}

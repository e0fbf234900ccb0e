//! Configuration for Courier queues.

use courier_storage::StoreOptions;
use std::fmt;
use std::path::{Path, PathBuf};

/// The queues Courier keeps on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Tracked events.
    Events,
    /// User identities.
    Identities,
}

impl QueueKind {
    /// All queue kinds, in drain order.
    pub const ALL: [QueueKind; 2] = [QueueKind::Events, QueueKind::Identities];

    /// File name of this queue inside the namespace directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            QueueKind::Events => "events",
            QueueKind::Identities => "identities",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Where and how queue files are stored.
///
/// # Example
///
/// ```rust
/// use courier_core::{Config, QueueKind};
/// use std::path::Path;
///
/// let config = Config::new("/var/lib/app");
/// assert_eq!(
///     config.queue_path(QueueKind::Events),
///     Path::new("/var/lib/app/courier/events")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory; queue files live under `<root_dir>/<namespace>/`.
    pub root_dir: PathBuf,
    /// Subdirectory name for this library's files.
    pub namespace: String,
    /// Options passed to every file-backed store.
    pub store: StoreOptions,
}

impl Config {
    /// Default namespace directory.
    pub const DEFAULT_NAMESPACE: &'static str = "courier";

    /// Creates a configuration rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
            store: StoreOptions::default(),
        }
    }

    /// Sets the namespace directory.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the store options.
    #[must_use]
    pub fn with_store_options(mut self, store: StoreOptions) -> Self {
        self.store = store;
        self
    }

    /// Returns the namespace directory.
    #[must_use]
    pub fn namespace_dir(&self) -> PathBuf {
        self.root_dir.join(&self.namespace)
    }

    /// Returns the file path for a queue.
    #[must_use]
    pub fn queue_path(&self, kind: QueueKind) -> PathBuf {
        self.namespace_dir().join(kind.file_name())
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        let config = Config::new("/data");
        assert_eq!(config.namespace, "courier");
        assert_eq!(config.queue_path(QueueKind::Events), PathBuf::from("/data/courier/events"));
        assert_eq!(
            config.queue_path(QueueKind::Identities),
            PathBuf::from("/data/courier/identities")
        );
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new("/data")
            .with_namespace("analytics")
            .with_store_options(StoreOptions::new().shrink_threshold(1024));

        assert_eq!(config.namespace_dir(), PathBuf::from("/data/analytics"));
        assert_eq!(config.store.shrink_threshold, 1024);
    }

    #[test]
    fn queue_kind_display() {
        assert_eq!(QueueKind::Events.to_string(), "events");
        assert_eq!(QueueKind::ALL.len(), 2);
    }
}

//! Configuration for the drain pipeline.

use std::time::Duration;

/// Configuration for draining queues to the collection host.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Collection host, with or without a scheme (e.g. "api.example.com").
    pub host: String,
    /// Maximum records per send.
    pub batch_size: u64,
    /// How long a single send may take before the pass gives up.
    pub send_timeout: Duration,
    /// Interval for the periodic flush of every lane. `None` disables it.
    pub flush_interval: Option<Duration>,
}

impl DrainConfig {
    /// Creates a configuration for the given host with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            batch_size: 100,
            send_timeout: Duration::from_secs(15),
            flush_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Sets the batch size. Values below one are raised to one.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the per-send timeout.
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the periodic flush interval.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Disables the periodic flush.
    #[must_use]
    pub fn without_flush_interval(mut self) -> Self {
        self.flush_interval = None;
        self
    }

    /// Base URL for requests. `https://` is assumed when the host has no
    /// scheme.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DrainConfig::new("api.example.com");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.send_timeout, Duration::from_secs(15));
        assert_eq!(config.flush_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn builder_pattern() {
        let config = DrainConfig::new("api.example.com")
            .with_batch_size(0)
            .with_send_timeout(Duration::from_millis(250))
            .without_flush_interval();

        assert_eq!(config.batch_size, 1);
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert!(config.flush_interval.is_none());
    }

    #[test]
    fn base_url_adds_scheme() {
        assert_eq!(DrainConfig::new("api.example.com").base_url(), "https://api.example.com");
        assert_eq!(
            DrainConfig::new("http://localhost:8080/").base_url(),
            "http://localhost:8080"
        );
    }
}

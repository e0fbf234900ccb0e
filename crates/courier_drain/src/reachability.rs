//! Network reachability checks.

use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Answers whether the collection host can currently be reached.
///
/// The pipeline asks before every pass and skips the pass entirely when the
/// answer is no.
pub trait Reachability: Send + Sync {
    /// Returns true if `host` looks reachable.
    fn is_reachable(&self, host: &str) -> bool;
}

/// Treats every host as reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

impl Reachability for AlwaysReachable {
    fn is_reachable(&self, _host: &str) -> bool {
        true
    }
}

/// Considers a host reachable if its name resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsReachability;

impl Reachability for DnsReachability {
    fn is_reachable(&self, host: &str) -> bool {
        let (name, port) = split_host(host);
        match (name, port).to_socket_addrs() {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                tracing::debug!(host = name, error = %e, "host does not resolve");
                false
            }
        }
    }
}

/// Extracts the host name and port from a host or URL.
fn split_host(host: &str) -> (&str, u16) {
    let (default_port, rest) = match host.split_once("://") {
        Some(("http", rest)) => (80, rest),
        Some((_, rest)) => (443, rest),
        None => (443, host),
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(port) => (name, port),
            Err(_) => (authority, default_port),
        },
        None => (authority, default_port),
    }
}

/// A reachability check for testing.
#[derive(Debug)]
pub struct MockReachability {
    reachable: AtomicBool,
    checks: AtomicU64,
}

impl Default for MockReachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MockReachability {
    /// Creates a mock with a fixed answer.
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            checks: AtomicU64::new(0),
        }
    }

    /// Changes the answer.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of times the check was made.
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::SeqCst)
    }
}

impl Reachability for MockReachability {
    fn is_reachable(&self, _host: &str) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}

//! Connection registry
//!
//! Tracks live connections and their usernames. The registry is the single
//! source of truth for "who is online": every membership question and every
//! mutation goes through its lock, and the uniqueness check is fused with
//! insertion so no two sessions can race the same name past a separate
//! check-then-act window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use linechat_protocol::ServerLine;

/// Channel end the registry holds for a connection's outbound lines.
///
/// The session task exclusively owns the socket; everyone else reaches the
/// connection only through this sender.
pub type OutboundSender = mpsc::Sender<ServerLine>;

/// Unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    /// Create a ConnId from a raw value (mainly for testing)
    #[cfg(test)]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Conn({})", self.0)
    }
}

/// Entry for a registered connection
///
/// Created on successful handshake, removed on disconnect, never mutated
/// in between.
pub struct RegistryEntry {
    /// Username negotiated during the handshake
    pub username: String,
    /// Channel for delivering lines to this connection
    pub sender: OutboundSender,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("username", &self.username)
            .field("sender_closed", &self.sender.is_closed())
            .finish()
    }
}

/// Registry of live connection -> username mappings
///
/// Thread-safe for concurrent access from session tasks. A single mutex
/// guards the whole map; critical sections are short and never span I/O.
pub struct Registry {
    /// Connection ID -> registry entry, behind the one exclusive lock
    entries: Mutex<HashMap<ConnId, RegistryEntry>>,
    /// Counter for generating unique connection IDs
    next_conn_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Allocate an identifier for a newly accepted connection
    pub fn issue_id(&self) -> ConnId {
        ConnId(self.next_conn_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a connection under `username`, atomically with the
    /// uniqueness check.
    ///
    /// Returns `false` without inserting anything if some live entry
    /// already holds `username`. Of any number of concurrent claims for
    /// the same name, at most one succeeds.
    pub fn claim(&self, id: ConnId, username: &str, sender: OutboundSender) -> bool {
        let mut entries = self.entries.lock();

        if entries.values().any(|entry| entry.username == username) {
            return false;
        }

        let previous = entries.insert(
            id,
            RegistryEntry {
                username: username.to_string(),
                sender,
            },
        );
        debug_assert!(previous.is_none(), "connection registered twice");

        debug!("Registered {} as '{}'", id, username);
        true
    }

    /// Remove a connection, returning its username
    ///
    /// Idempotent: the first call returns the username, later calls return
    /// `None`. Dropping the stored sender closes the connection's outbound
    /// channel, which its session observes during teardown.
    pub fn remove(&self, id: ConnId) -> Option<String> {
        let removed = self.entries.lock().remove(&id);
        match removed {
            Some(entry) => {
                debug!("Removed {} ('{}')", id, entry.username);
                Some(entry.username)
            }
            None => None,
        }
    }

    /// Whether some live entry holds `username`
    pub fn contains_name(&self, username: &str) -> bool {
        self.entries
            .lock()
            .values()
            .any(|entry| entry.username == username)
    }

    /// Number of live entries
    pub fn online_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Stable copy of all entries, taken under the lock
    ///
    /// Exposed only inside the crate so enumeration stays the relay's
    /// business; socket writes never happen while the lock is held.
    pub(crate) fn snapshot(&self) -> Vec<(ConnId, String, OutboundSender)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (*id, entry.username.clone(), entry.sender.clone()))
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("online_count", &self.entries.lock().len())
            .field("next_conn_id", &self.next_conn_id.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (OutboundSender, mpsc::Receiver<ServerLine>) {
        mpsc::channel(8)
    }

    #[test]
    fn test_registry_new() {
        let registry = Registry::new();
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn test_conn_id_display() {
        assert_eq!(format!("{}", ConnId::new(42)), "Conn(42)");
    }

    #[test]
    fn test_issue_id_unique() {
        let registry = Registry::new();
        let a = registry.issue_id();
        let b = registry.issue_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_claim_and_count() {
        let registry = Registry::new();
        let (tx, _rx) = sender();
        let id = registry.issue_id();

        assert!(registry.claim(id, "alice", tx));
        assert_eq!(registry.online_count(), 1);
        assert!(registry.contains_name("alice"));
        assert!(!registry.contains_name("bob"));
    }

    #[test]
    fn test_claim_duplicate_name_rejected() {
        let registry = Registry::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        assert!(registry.claim(registry.issue_id(), "alice", tx1));
        assert!(!registry.claim(registry.issue_id(), "alice", tx2));
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn test_name_reusable_after_removal() {
        let registry = Registry::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();
        let id = registry.issue_id();

        assert!(registry.claim(id, "alice", tx1));
        assert_eq!(registry.remove(id), Some("alice".to_string()));
        assert!(registry.claim(registry.issue_id(), "alice", tx2));
    }

    #[test]
    fn test_remove_idempotent() {
        let registry = Registry::new();
        let (tx, _rx) = sender();
        let id = registry.issue_id();

        registry.claim(id, "alice", tx);
        assert_eq!(registry.remove(id), Some("alice".to_string()));
        assert_eq!(registry.remove(id), None);
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn test_remove_unknown_id() {
        let registry = Registry::new();
        assert_eq!(registry.remove(ConnId::new(999)), None);
    }

    #[test]
    fn test_snapshot_is_stable_copy() {
        let registry = Registry::new();
        let (tx, _rx) = sender();
        let id = registry.issue_id();
        registry.claim(id, "alice", tx);

        let snapshot = registry.snapshot();
        registry.remove(id);

        // The copy is unaffected by later mutation.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, id);
        assert_eq!(snapshot[0].1, "alice");
        assert_eq!(registry.online_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_claims_one_winner() {
        use std::sync::Arc;

        let registry = Arc::new(Registry::new());
        let mut handles = vec![];

        for _ in 0..50 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::channel(8);
                registry.claim(registry.issue_id(), "alice", tx)
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(registry.online_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_distinct_claims_all_win() {
        use std::sync::Arc;

        let registry = Arc::new(Registry::new());
        let mut handles = vec![];

        for i in 0..50 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::channel(8);
                registry.claim(registry.issue_id(), &format!("user-{}", i), tx)
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(registry.online_count(), 50);
    }

    #[test]
    fn test_registry_debug() {
        let registry = Registry::new();
        let debug = format!("{:?}", registry);
        assert!(debug.contains("Registry"));
        assert!(debug.contains("online_count"));
    }
}

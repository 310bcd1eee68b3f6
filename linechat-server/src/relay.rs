//! Broadcast relay
//!
//! Fans one line out to every registered connection except the sender.
//! The peer list is snapshotted under the registry lock and the lock is
//! released before any delivery, so a slow peer never stalls the registry.
//! Delivery is a non-blocking `try_send` into each peer's bounded outbound
//! channel; a full or closed channel counts as a write failure and evicts
//! that peer, without aborting delivery to the rest.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use linechat_protocol::ServerLine;

use crate::registry::{ConnId, Registry};

/// Fan-out of server lines to registered connections
#[derive(Clone)]
pub struct Relay {
    registry: Arc<Registry>,
}

impl Relay {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Deliver `line` to every registered connection except `sender`
    ///
    /// Returns the number of peers the line was queued for. Peers whose
    /// outbound channel is closed (session gone) or full (stalled reader)
    /// are removed from the registry after the sweep; dropping their
    /// stored sender is what signals their session to close the socket,
    /// exactly once.
    pub fn broadcast(&self, sender: ConnId, line: ServerLine) -> usize {
        let peers = self.registry.snapshot();

        let mut delivered = 0;
        let mut evict = Vec::new();

        for (id, username, tx) in &peers {
            if *id == sender {
                continue;
            }

            match tx.try_send(line.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Closed(_)) => {
                    debug!("{} ('{}') outbound channel closed", id, username);
                    evict.push(*id);
                }
                Err(TrySendError::Full(_)) => {
                    warn!("{} ('{}') outbound buffer full, evicting", id, username);
                    evict.push(*id);
                }
            }
        }

        for id in evict {
            if let Some(username) = self.registry.remove(id) {
                warn!("Evicted {} ('{}') during broadcast", id, username);
            }
        }

        delivered
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("online_count", &self.registry.online_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn chat(body: &str) -> ServerLine {
        ServerLine::Chat {
            username: "alice".into(),
            body: body.into(),
        }
    }

    fn setup() -> (Arc<Registry>, Relay) {
        let registry = Arc::new(Registry::new());
        let relay = Relay::new(Arc::clone(&registry));
        (registry, relay)
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let (registry, relay) = setup();

        let (alice_tx, mut alice_rx) = mpsc::channel(8);
        let (bob_tx, mut bob_rx) = mpsc::channel(8);
        let alice = registry.issue_id();
        let bob = registry.issue_id();
        registry.claim(alice, "alice", alice_tx);
        registry.claim(bob, "bob", bob_tx);

        let delivered = relay.broadcast(alice, chat("hi"));

        assert_eq!(delivered, 1);
        assert_eq!(bob_rx.recv().await.unwrap(), chat("hi"));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_registry() {
        let (registry, relay) = setup();
        let lonely = registry.issue_id();

        assert_eq!(relay.broadcast(lonely, chat("anyone?")), 0);
    }

    #[tokio::test]
    async fn test_dead_peer_evicted_others_still_delivered() {
        let (registry, relay) = setup();

        let (bob_tx, mut bob_rx) = mpsc::channel(8);
        let (carol_tx, carol_rx) = mpsc::channel(8);
        let sender = registry.issue_id();
        let bob = registry.issue_id();
        let carol = registry.issue_id();
        let (sender_tx, _sender_rx) = mpsc::channel(8);
        registry.claim(sender, "alice", sender_tx);
        registry.claim(bob, "bob", bob_tx);
        registry.claim(carol, "carol", carol_tx);

        // Carol's session is gone: her receiver is dropped.
        drop(carol_rx);

        let delivered = relay.broadcast(sender, chat("hi"));

        assert_eq!(delivered, 1);
        assert_eq!(bob_rx.recv().await.unwrap(), chat("hi"));
        assert_eq!(registry.online_count(), 2);
        assert!(!registry.contains_name("carol"));
    }

    #[tokio::test]
    async fn test_stalled_peer_evicted() {
        let (registry, relay) = setup();

        let (bob_tx, _bob_rx) = mpsc::channel(1);
        let sender = registry.issue_id();
        let bob = registry.issue_id();
        let (sender_tx, _sender_rx) = mpsc::channel(8);
        registry.claim(sender, "alice", sender_tx);
        registry.claim(bob, "bob", bob_tx);

        // First line fills bob's buffer; the second one evicts him.
        assert_eq!(relay.broadcast(sender, chat("one")), 1);
        assert_eq!(relay.broadcast(sender, chat("two")), 0);

        assert!(!registry.contains_name("bob"));
        assert_eq!(registry.online_count(), 1);
    }

    #[tokio::test]
    async fn test_per_sender_order_preserved() {
        let (registry, relay) = setup();

        let (bob_tx, mut bob_rx) = mpsc::channel(8);
        let sender = registry.issue_id();
        let bob = registry.issue_id();
        let (sender_tx, _sender_rx) = mpsc::channel(8);
        registry.claim(sender, "alice", sender_tx);
        registry.claim(bob, "bob", bob_tx);

        for body in ["one", "two", "three"] {
            relay.broadcast(sender, chat(body));
        }

        assert_eq!(bob_rx.recv().await.unwrap(), chat("one"));
        assert_eq!(bob_rx.recv().await.unwrap(), chat("two"));
        assert_eq!(bob_rx.recv().await.unwrap(), chat("three"));
    }

    #[tokio::test]
    async fn test_concurrent_broadcasts_all_arrive() {
        let (registry, relay) = setup();

        let mut receivers = Vec::new();
        let mut senders = Vec::new();
        for i in 0..4 {
            let (tx, rx) = mpsc::channel(256);
            let id = registry.issue_id();
            registry.claim(id, &format!("user-{}", i), tx);
            receivers.push(rx);
            senders.push(id);
        }

        let mut handles = vec![];
        for &id in &senders {
            let relay = relay.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..10 {
                    relay.broadcast(
                        id,
                        ServerLine::Chat {
                            username: format!("{}", id),
                            body: format!("msg {}", n),
                        },
                    );
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 3 other senders x 10 lines each.
        for mut rx in receivers {
            let mut count = 0;
            while rx.try_recv().is_ok() {
                count += 1;
            }
            assert_eq!(count, 30);
        }
    }
}

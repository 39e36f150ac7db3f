//! Real-time fan-out layer: connection registry, presence, broadcast
//! dispatch, and the recent-history buffer behind the WebSocket endpoint.

pub mod dispatcher;
pub mod events;
pub mod history;
pub mod registry;
pub mod server;

use std::sync::Arc;

use dispatcher::Dispatcher;
use events::BroadcastEvent;
use history::HistoryBuffer;
use registry::{ConnectionEntry, ConnectionRegistry, DuplicateConnection};

/// Wires the registry, history buffer, and dispatcher together.
///
/// Constructed once at startup and stored in `AppState`; route handlers
/// publish through it and the WebSocket server admits and evicts through it.
/// Admission and eviction recompute the presence count and broadcast it
/// before returning, so the count never goes stale.
pub struct Gateway {
    registry: Arc<ConnectionRegistry>,
    history: Arc<HistoryBuffer>,
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn new(history_cap: usize) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let history = Arc::new(HistoryBuffer::new(history_cap));
        let dispatcher = Dispatcher::new(registry.clone(), history.clone());
        Self {
            registry,
            history,
            dispatcher,
        }
    }

    /// Admit a connection and broadcast the new presence count.
    ///
    /// Fails with [`DuplicateConnection`] if the id is already registered,
    /// in which case nothing changes and nothing is broadcast.
    pub fn admit(&self, entry: ConnectionEntry) -> Result<(), DuplicateConnection> {
        self.registry.admit(entry)?;
        self.dispatcher.presence_changed();
        Ok(())
    }

    /// Evict a connection if present and broadcast the new presence count.
    ///
    /// Evicting an unknown (or already-evicted) id is a no-op and fires no
    /// broadcast.
    pub fn evict(&self, connection_id: &str) {
        if self.registry.evict(connection_id) {
            self.dispatcher.presence_changed();
        }
    }

    /// Publish a fully-formed event to all live connections.
    pub fn publish(&self, event: &BroadcastEvent) {
        self.dispatcher.publish(event);
    }

    /// Frames retained for late joiners, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.snapshot()
    }

    /// Distinct users currently holding at least one live connection.
    pub fn online_count(&self) -> usize {
        self.registry.count_distinct_users()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn admit(
        gateway: &Gateway,
        connection_id: &str,
        user_id: &str,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        gateway
            .admit(ConnectionEntry {
                connection_id: connection_id.to_string(),
                user_id: user_id.to_string(),
                display_name: format!("User {user_id}"),
                sender: tx,
            })
            .unwrap();
        rx
    }

    fn presence_counts(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<u64> {
        let mut counts = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let wire: serde_json::Value = serde_json::from_str(&frame).unwrap();
            if wire["type"] == "presence" {
                counts.push(wire["data"].as_u64().unwrap());
            }
        }
        counts
    }

    #[test]
    fn admissions_and_evictions_track_distinct_users() {
        let gateway = Gateway::new(100);
        let _c1 = admit(&gateway, "conn_1", "u1");
        let _c2 = admit(&gateway, "conn_2", "u1");
        let _c3 = admit(&gateway, "conn_3", "u2");
        assert_eq!(gateway.online_count(), 2);

        gateway.evict("conn_1");
        assert_eq!(gateway.online_count(), 2);

        gateway.evict("conn_2");
        assert_eq!(gateway.online_count(), 1);
    }

    #[test]
    fn every_admission_broadcasts_presence_to_everyone() {
        let gateway = Gateway::new(100);
        let mut c1 = admit(&gateway, "conn_1", "u1");
        let mut c2 = admit(&gateway, "conn_2", "u2");
        let mut c3 = admit(&gateway, "conn_3", "u3");

        // c1 was connected for all three admissions, c2 for two, c3 for one.
        assert_eq!(presence_counts(&mut c1), vec![1, 2, 3]);
        assert_eq!(presence_counts(&mut c2), vec![2, 3]);
        assert_eq!(presence_counts(&mut c3), vec![3]);
    }

    #[test]
    fn eviction_broadcasts_presence_to_survivors() {
        let gateway = Gateway::new(100);
        let mut c1 = admit(&gateway, "conn_1", "u1");
        let _c2 = admit(&gateway, "conn_2", "u2");
        presence_counts(&mut c1); // discard admission-time frames

        gateway.evict("conn_2");
        assert_eq!(presence_counts(&mut c1), vec![1]);
    }

    #[test]
    fn double_eviction_fires_no_second_presence_broadcast() {
        let gateway = Gateway::new(100);
        let mut c1 = admit(&gateway, "conn_1", "u1");
        let _c2 = admit(&gateway, "conn_2", "u2");
        presence_counts(&mut c1);

        gateway.evict("conn_2");
        gateway.evict("conn_2");

        assert_eq!(
            presence_counts(&mut c1),
            vec![1],
            "a no-op eviction must not rebroadcast"
        );
    }

    #[test]
    fn duplicate_admission_changes_nothing() {
        let gateway = Gateway::new(100);
        let mut c1 = admit(&gateway, "conn_1", "u1");
        presence_counts(&mut c1);

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = gateway.admit(ConnectionEntry {
            connection_id: "conn_1".to_string(),
            user_id: "u2".to_string(),
            display_name: "Impostor".to_string(),
            sender: tx,
        });

        assert!(result.is_err());
        assert_eq!(gateway.online_count(), 1);
        assert!(
            presence_counts(&mut c1).is_empty(),
            "rejected admission must not broadcast"
        );
    }

    #[test]
    fn history_snapshot_feeds_late_joiners() {
        use crate::models::chat_message::ChatMessageResponse;
        use chrono::Utc;

        let gateway = Gateway::new(100);
        gateway.publish(&BroadcastEvent::Chat {
            data: ChatMessageResponse {
                id: 1,
                message: "before you joined".to_string(),
                author_name: "Ann".to_string(),
                created_at: Utc::now(),
            },
            origin_connection_id: None,
        });

        let history = gateway.history();
        assert_eq!(history.len(), 1);
        let wire: serde_json::Value = serde_json::from_str(&history[0]).unwrap();
        assert_eq!(wire["data"]["message"], "before you joined");
    }
}

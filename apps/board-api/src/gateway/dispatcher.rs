//! Fan-out of broadcast events to every live connection.

use std::sync::Arc;

use super::events::BroadcastEvent;
use super::history::HistoryBuffer;
use super::registry::ConnectionRegistry;

/// Delivers events to the registry's current snapshot and retains chat and
/// notice frames for late joiners.
///
/// Exactly one dispatcher exists per process. `publish` runs to completion
/// without awaiting, so two calls never interleave their writes to the same
/// connection; within one call every recipient sees the snapshot's iteration
/// order.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    history: Arc<HistoryBuffer>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, history: Arc<HistoryBuffer>) -> Self {
        Self { registry, history }
    }

    /// Serialize and deliver one event.
    ///
    /// The history append only happens after serialization succeeds, so a
    /// bad payload can never corrupt the buffer. A failed send marks that
    /// connection dead: it is evicted and delivery continues with the rest.
    /// The publisher never sees an error — fan-out is best-effort by design.
    pub fn publish(&self, event: &BroadcastEvent) {
        let frame = match event.to_wire() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(?e, "dropping unserializable broadcast event");
                return;
            }
        };

        if event.retained() {
            self.history.append(frame.clone());
        }

        let mut dead = Vec::new();
        for conn in self.registry.snapshot() {
            if event.origin_connection_id() == Some(conn.connection_id.as_str()) {
                continue;
            }
            if conn.sender.is_closed() || conn.sender.send(frame.clone()).is_err() {
                tracing::debug!(
                    connection_id = %conn.connection_id,
                    user_id = %conn.user_id,
                    display_name = %conn.display_name,
                    "write failed, marking connection dead"
                );
                dead.push(conn.connection_id);
            }
        }

        for connection_id in dead {
            if self.registry.evict(&connection_id) {
                self.presence_changed();
            }
        }
    }

    /// Recompute the distinct-user count from one registry snapshot and
    /// broadcast it to every connection — no exclusions, so every client
    /// converges on the same number.
    pub fn presence_changed(&self) {
        let count = self.registry.count_distinct_users();
        self.publish(&BroadcastEvent::Presence { count });
    }
}

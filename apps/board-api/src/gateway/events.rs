//! Broadcast event types and the wire frames pushed to connected clients.

use serde::{Deserialize, Serialize};

use crate::models::chat_message::ChatMessageResponse;
use crate::models::notice::NoticeResponse;

// ---------------------------------------------------------------------------
// Server → Client broadcasts
// ---------------------------------------------------------------------------

/// An immutable, fully-formed event destined for connected clients.
///
/// Payloads arrive here already enriched (author names resolved, timestamps
/// set) — the dispatcher only serializes and delivers. A chat event carries
/// the originating connection id so the sender, which already holds an
/// optimistic local copy, is not echoed its own message. Notices have no
/// origin: every session sees them, including the creator's.
#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    Chat {
        data: ChatMessageResponse,
        origin_connection_id: Option<String>,
    },
    Notice {
        data: NoticeResponse,
    },
    Presence {
        count: usize,
    },
}

impl BroadcastEvent {
    /// Connection to skip during delivery, if any.
    pub fn origin_connection_id(&self) -> Option<&str> {
        match self {
            BroadcastEvent::Chat {
                origin_connection_id,
                ..
            } => origin_connection_id.as_deref(),
            _ => None,
        }
    }

    /// Whether the serialized frame is retained for late joiners.
    /// Presence counts are ephemeral.
    pub fn retained(&self) -> bool {
        !matches!(self, BroadcastEvent::Presence { .. })
    }

    /// Serialize to the wire frame `{"type": ..., "data": ...}`.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        let frame = match self {
            BroadcastEvent::Chat { data, .. } => WireFrame::Chat(data),
            BroadcastEvent::Notice { data } => WireFrame::Notice(data),
            BroadcastEvent::Presence { count } => WireFrame::Presence(*count),
        };
        serde_json::to_string(&frame)
    }
}

/// Tagged wire representation shared by every broadcast kind.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum WireFrame<'a> {
    Chat(&'a ChatMessageResponse),
    Notice(&'a NoticeResponse),
    Presence(usize),
}

// ---------------------------------------------------------------------------
// Client → Server frames
// ---------------------------------------------------------------------------

/// A frame received from the client over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// First frame after the socket opens: authenticate and join.
    Identify { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn chat_payload() -> ChatMessageResponse {
        ChatMessageResponse {
            id: 7_152_829_551_616,
            message: "hi".to_string(),
            author_name: "Ann".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap(),
        }
    }

    fn notice_payload() -> NoticeResponse {
        NoticeResponse {
            id: "ntc_01J0000000000000000000000A".to_string(),
            title: "Library hours".to_string(),
            content: "Extended during finals.".to_string(),
            category: "facilities".to_string(),
            priority: "normal".to_string(),
            is_pinned: false,
            author_name: "Library Staff".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2025, 7, 8, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn chat_wire_frame_shape() {
        let event = BroadcastEvent::Chat {
            data: chat_payload(),
            origin_connection_id: Some("conn_x".to_string()),
        };
        let wire: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();

        assert_eq!(wire["type"], "chat");
        assert_eq!(wire["data"]["id"], 7_152_829_551_616i64);
        assert_eq!(wire["data"]["message"], "hi");
        assert_eq!(wire["data"]["authorName"], "Ann");
        assert!(wire["data"]["createdAt"].is_string());
        // The origin id is delivery metadata, not payload.
        assert!(wire["data"].get("originConnectionId").is_none());
    }

    #[test]
    fn notice_wire_frame_shape() {
        let event = BroadcastEvent::Notice {
            data: notice_payload(),
        };
        let wire: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();

        assert_eq!(wire["type"], "notice");
        let data = &wire["data"];
        for key in [
            "id",
            "title",
            "content",
            "category",
            "priority",
            "isPinned",
            "authorName",
            "createdAt",
            "expiresAt",
        ] {
            assert!(data.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(data["isPinned"], false);
    }

    #[test]
    fn presence_wire_frame_is_bare_integer() {
        let event = BroadcastEvent::Presence { count: 3 };
        let wire: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();

        assert_eq!(wire["type"], "presence");
        assert_eq!(wire["data"], 3);
    }

    #[test]
    fn origin_is_only_set_for_chat() {
        let chat = BroadcastEvent::Chat {
            data: chat_payload(),
            origin_connection_id: Some("conn_x".to_string()),
        };
        assert_eq!(chat.origin_connection_id(), Some("conn_x"));

        let notice = BroadcastEvent::Notice {
            data: notice_payload(),
        };
        assert_eq!(notice.origin_connection_id(), None);

        let presence = BroadcastEvent::Presence { count: 1 };
        assert_eq!(presence.origin_connection_id(), None);
    }

    #[test]
    fn presence_is_not_retained() {
        assert!(BroadcastEvent::Chat {
            data: chat_payload(),
            origin_connection_id: None,
        }
        .retained());
        assert!(BroadcastEvent::Notice {
            data: notice_payload(),
        }
        .retained());
        assert!(!BroadcastEvent::Presence { count: 0 }.retained());
    }

    #[test]
    fn identify_frame_parses() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"identify","token":"abc.def.ghi"}"#).unwrap();
        let ClientFrame::Identify { token } = frame;
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn unknown_client_frame_is_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout","loud":true}"#).is_err());
    }
}

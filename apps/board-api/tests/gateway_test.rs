//! End-to-end tests for the real-time fan-out layer: registry, dispatcher,
//! presence, and history working together behind the `Gateway` facade.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use board_api::gateway::events::BroadcastEvent;
use board_api::gateway::registry::ConnectionEntry;
use board_api::gateway::Gateway;
use board_api::models::chat_message::ChatMessageResponse;
use board_api::models::notice::NoticeResponse;

/// Helper: admit a connection and return its outbound queue.
fn admit(gateway: &Gateway, connection_id: &str, user_id: &str) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    gateway
        .admit(ConnectionEntry {
            connection_id: connection_id.to_string(),
            user_id: user_id.to_string(),
            display_name: format!("User {user_id}"),
            sender: tx,
        })
        .expect("admission should succeed");
    rx
}

/// Helper: drain all queued frames as parsed JSON.
fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).expect("every frame is valid JSON"));
    }
    frames
}

fn chat(message: &str, origin: Option<&str>) -> BroadcastEvent {
    BroadcastEvent::Chat {
        data: ChatMessageResponse {
            id: 1,
            message: message.to_string(),
            author_name: "Ann".to_string(),
            created_at: Utc::now(),
        },
        origin_connection_id: origin.map(str::to_string),
    }
}

fn notice(title: &str) -> BroadcastEvent {
    let now = Utc::now();
    BroadcastEvent::Notice {
        data: NoticeResponse {
            id: "ntc_1".to_string(),
            title: title.to_string(),
            content: "content".to_string(),
            category: "general".to_string(),
            priority: "normal".to_string(),
            is_pinned: false,
            author_name: "Ann".to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::days(7),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_fanout_excludes_sender_and_lands_in_history() {
    let gateway = Gateway::new(100);
    let mut c1 = admit(&gateway, "conn_1", "u1");
    let mut c2 = admit(&gateway, "conn_2", "u1");
    let mut c3 = admit(&gateway, "conn_3", "u2");

    // Clear admission-time presence frames.
    drain(&mut c1);
    drain(&mut c2);
    drain(&mut c3);

    gateway.publish(&chat("hi", Some("conn_3")));

    for rx in [&mut c1, &mut c2] {
        let frames = drain(rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "chat");
        assert_eq!(frames[0]["data"]["message"], "hi");
        assert_eq!(frames[0]["data"]["authorName"], "Ann");
    }
    assert!(drain(&mut c3).is_empty(), "the sender must receive nothing");
    assert_eq!(gateway.history().len(), 1);
}

#[tokio::test]
async fn presence_converges_across_joins_and_leaves() {
    let gateway = Gateway::new(100);
    let mut c1 = admit(&gateway, "conn_1", "u1");
    let _c2 = admit(&gateway, "conn_2", "u1");
    let _c3 = admit(&gateway, "conn_3", "u2");

    // c1 observed all three admissions: 1, 2, 2 distinct users.
    let counts: Vec<u64> = drain(&mut c1)
        .iter()
        .filter(|f| f["type"] == "presence")
        .map(|f| f["data"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![1, 1, 2]);

    // Closing one of u1's tabs leaves the user online.
    gateway.evict("conn_2");
    assert_eq!(gateway.online_count(), 2);

    gateway.evict("conn_3");
    assert_eq!(gateway.online_count(), 1);

    let counts: Vec<u64> = drain(&mut c1)
        .iter()
        .filter(|f| f["type"] == "presence")
        .map(|f| f["data"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![2, 1]);
}

#[tokio::test]
async fn notices_reach_every_session_and_chat_history_trims() {
    let gateway = Gateway::new(100);
    let mut creator = admit(&gateway, "conn_creator", "u1");
    drain(&mut creator);

    gateway.publish(&notice("Exam schedule"));
    let frames = drain(&mut creator);
    assert_eq!(frames.len(), 1, "no self-exclusion for notices");
    assert_eq!(frames[0]["type"], "notice");

    // Push the buffer past its cap; the oldest entries drop off.
    for i in 0..120 {
        gateway.publish(&chat(&format!("message {i}"), None));
    }
    let history = gateway.history();
    assert_eq!(history.len(), 100);
    let first: serde_json::Value = serde_json::from_str(&history[0]).unwrap();
    assert_eq!(first["data"]["message"], "message 20");
}

#[tokio::test]
async fn late_joiner_sees_chronological_history() {
    let gateway = Gateway::new(100);

    for i in 1..=5 {
        gateway.publish(&chat(&format!("m{i}"), None));
    }

    // The frames a joining connection would be replayed, oldest first.
    let replay: Vec<String> = gateway
        .history()
        .iter()
        .map(|f| {
            serde_json::from_str::<serde_json::Value>(f).unwrap()["data"]["message"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(replay, vec!["m1", "m2", "m3", "m4", "m5"]);
}

#[tokio::test]
async fn dead_connections_are_pruned_during_fanout() {
    let gateway = Gateway::new(100);
    let mut alive = admit(&gateway, "conn_alive", "u1");

    let dead_rx = admit(&gateway, "conn_dead", "u2");
    drop(dead_rx);
    drain(&mut alive);
    assert_eq!(gateway.online_count(), 2);

    gateway.publish(&chat("anyone?", None));

    assert_eq!(gateway.online_count(), 1);
    let frames = drain(&mut alive);
    assert_eq!(frames[0]["type"], "chat");
    assert_eq!(frames[1]["type"], "presence");
    assert_eq!(frames[1]["data"], 1);
}

#[tokio::test]
async fn concurrent_churn_settles_to_a_consistent_count() {
    let gateway = Arc::new(Gateway::new(100));

    // One long-lived observer collects frames while churn happens.
    let mut observer = admit(&gateway, "conn_observer", "observer");

    let mut handles = Vec::new();
    for task in 0..8 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..25 {
                let conn = format!("conn_{task}_{round}");
                let (tx, rx) = mpsc::unbounded_channel();
                gateway
                    .admit(ConnectionEntry {
                        connection_id: conn.clone(),
                        user_id: format!("user_{task}"),
                        display_name: format!("User {task}"),
                        sender: tx,
                    })
                    .unwrap();
                gateway.publish(&BroadcastEvent::Presence { count: 0 });
                gateway.evict(&conn);
                drop(rx);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // All churned connections are gone; only the observer remains.
    assert_eq!(gateway.online_count(), 1);

    // Every frame the observer saw was well-formed JSON with a known type.
    for frame in drain(&mut observer) {
        let kind = frame["type"].as_str().unwrap();
        assert!(matches!(kind, "chat" | "notice" | "presence"));
    }
}

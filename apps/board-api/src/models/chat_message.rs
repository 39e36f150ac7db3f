use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::chat_messages;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = chat_messages)]
pub struct ChatMessage {
    pub id: i64,
    pub message: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage<'a> {
    pub id: i64,
    pub message: &'a str,
    pub author_id: &'a str,
    pub created_at: DateTime<Utc>,
}

/// A chat message joined with its author's display name.
///
/// Doubles as the `chat` broadcast payload — fully formed before it reaches
/// the dispatcher.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageResponse {
    pub id: i64,
    pub message: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessageResponse {
    pub fn from_parts(message: ChatMessage, author_name: String) -> Self {
        Self {
            id: message.id,
            message: message.message,
            author_name,
            created_at: message.created_at,
        }
    }
}

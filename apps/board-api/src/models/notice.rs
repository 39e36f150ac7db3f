use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::notices;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notices)]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub category: String,
    pub priority: String,
    pub is_pinned: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notices)]
pub struct NewNotice<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub author_id: &'a str,
    pub category: &'a str,
    pub priority: &'a str,
    pub is_pinned: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A notice joined with its author's display name.
///
/// This is both the REST response shape and the `notice` broadcast payload —
/// fully formed before it reaches the dispatcher.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoticeResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub priority: String,
    pub is_pinned: bool,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NoticeResponse {
    pub fn from_parts(notice: Notice, author_name: String) -> Self {
        Self {
            id: notice.id,
            title: notice.title,
            content: notice.content,
            category: notice.category,
            priority: notice.priority,
            is_pinned: notice.is_pinned,
            author_name,
            created_at: notice.created_at,
            expires_at: notice.expires_at,
        }
    }
}

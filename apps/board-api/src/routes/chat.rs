//! Live chat endpoints.
//!
//! Chat is HTTP-authoritative: a message is persisted through this API and
//! the server then re-broadcasts it over the gateway, excluding the sender's
//! own socket (which already rendered an optimistic copy).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{chat_messages, users};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::events::BroadcastEvent;
use crate::models::chat_message::{ChatMessage, ChatMessageResponse, NewChatMessage};
use crate::AppState;

/// Maximum chat message length in characters.
const MAX_MESSAGE_LEN: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/chat/messages",
        get(list_messages).post(send_message),
    )
}

// ---------------------------------------------------------------------------
// GET /api/v1/chat/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListMessagesParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListMessagesResponse {
    pub data: Vec<ChatMessageResponse>,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/chat/messages",
    tag = "Chat",
    params(("limit" = Option<i64>, Query, description = "Max results (default 50, max 100)")),
    responses(
        (status = 200, description = "Recent messages, oldest first", body = ListMessagesResponse),
    ),
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ListMessagesParams>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);

    let mut conn = state.db.get().await?;

    // Fetch newest-first with one extra row to detect more, then flip to
    // chronological order for display.
    let mut rows: Vec<(ChatMessage, String)> = diesel_async::RunQueryDsl::load(
        chat_messages::table
            .inner_join(users::table)
            .select((ChatMessage::as_select(), users::full_name))
            .order(chat_messages::id.desc())
            .limit(limit + 1),
        &mut conn,
    )
    .await?;

    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);
    rows.reverse();

    Ok(Json(ListMessagesResponse {
        data: rows
            .into_iter()
            .map(|(message, author_name)| ChatMessageResponse::from_parts(message, author_name))
            .collect(),
        has_more,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/chat/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub message: String,
    /// The sender's gateway connection id, as delivered in its `ready`
    /// frame. That connection is skipped during the broadcast.
    #[serde(default)]
    pub connection_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/chat/messages",
    tag = "Chat",
    security(("bearer" = [])),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and broadcast", body = ChatMessageResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
    ),
)]
pub async fn send_message(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessageResponse>), ApiError> {
    // --- Validation ---
    let message = body.message.trim();
    let mut errors = Vec::new();
    if message.is_empty() {
        errors.push(FieldError {
            field: "message".to_string(),
            message: "Message cannot be empty".to_string(),
        });
    } else if message.chars().count() > MAX_MESSAGE_LEN {
        errors.push(FieldError {
            field: "message".to_string(),
            message: format!("Message too long (max {MAX_MESSAGE_LEN} characters)"),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let mut conn = state.db.get().await?;

    let author_name: String = diesel_async::RunQueryDsl::get_result(
        users::table.find(&user_id).select(users::full_name),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    let id = state.snowflake.generate();

    let stored: ChatMessage = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(chat_messages::table)
            .values(NewChatMessage {
                id,
                message,
                author_id: &user_id,
                created_at: Utc::now(),
            })
            .returning(ChatMessage::as_returning()),
        &mut conn,
    )
    .await?;

    let response = ChatMessageResponse::from_parts(stored, author_name);

    // Broadcast after the row is durable. The sender's own socket is
    // excluded; its HTTP response below is the acknowledgement.
    state.gateway.publish(&BroadcastEvent::Chat {
        data: response.clone(),
        origin_connection_id: body.connection_id,
    });

    Ok((StatusCode::CREATED, Json(response)))
}

//! Notice board CRUD endpoints.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::{notices, users};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::events::BroadcastEvent;
use crate::models::notice::{NewNotice, Notice, NoticeResponse};
use crate::AppState;

/// Categories a notice can be filed under.
const CATEGORIES: &[&str] = &[
    "general",
    "academic",
    "events",
    "facilities",
    "announcements",
];

/// Priorities in increasing order of urgency.
const PRIORITIES: &[&str] = &["normal", "medium", "high"];

/// Notices default to expiring a week after posting.
const DEFAULT_EXPIRY_DAYS: i64 = 7;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notices", get(list_notices).post(create_notice))
        .route("/notices/stats", get(notice_stats))
        .route("/notices/{notice_id}", delete(delete_notice))
        .route("/notices/{notice_id}/pin", patch(pin_notice))
}

// ---------------------------------------------------------------------------
// GET /api/v1/notices
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListNoticesParams {
    pub category: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notices",
    tag = "Notices",
    params(
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("q" = Option<String>, Query, description = "Search in title and content"),
        ("limit" = Option<i64>, Query, description = "Max results (default 50, max 100)"),
    ),
    responses(
        (status = 200, description = "Unexpired notices, pinned first then newest", body = [NoticeResponse]),
    ),
)]
pub async fn list_notices(
    State(state): State<AppState>,
    Query(params): Query<ListNoticesParams>,
) -> Result<Json<Vec<NoticeResponse>>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);

    let mut conn = state.db.get().await?;

    let mut query = notices::table
        .inner_join(users::table)
        .select((Notice::as_select(), users::full_name))
        .filter(notices::expires_at.gt(Utc::now()))
        .into_boxed();

    if let Some(category) = params.category.filter(|c| c.as_str() != "all") {
        query = query.filter(notices::category.eq(category));
    }

    if let Some(q) = params.q.filter(|q| !q.trim().is_empty()) {
        let pattern = format!("%{}%", q.trim());
        query = query.filter(
            notices::title
                .ilike(pattern.clone())
                .or(notices::content.ilike(pattern)),
        );
    }

    let rows: Vec<(Notice, String)> = diesel_async::RunQueryDsl::load(
        query
            .order((notices::is_pinned.desc(), notices::created_at.desc()))
            .limit(limit),
        &mut conn,
    )
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(notice, author_name)| NoticeResponse::from_parts(notice, author_name))
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/v1/notices
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNoticeRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/api/v1/notices",
    tag = "Notices",
    security(("bearer" = [])),
    request_body = CreateNoticeRequest,
    responses(
        (status = 201, description = "Notice created and broadcast", body = NoticeResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
    ),
)]
pub async fn create_notice(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateNoticeRequest>,
) -> Result<(StatusCode, Json<NoticeResponse>), ApiError> {
    // --- Validation ---
    let mut errors: Vec<FieldError> = Vec::new();

    let title = body.title.trim().to_string();
    if title.is_empty() || title.len() > 255 {
        errors.push(FieldError {
            field: "title".into(),
            message: "Title must be 1–255 characters".into(),
        });
    }

    let content = body.content.trim().to_string();
    if content.is_empty() || content.len() > 1000 {
        errors.push(FieldError {
            field: "content".into(),
            message: "Content must be 1–1000 characters".into(),
        });
    }

    let category = body.category.unwrap_or_else(|| "general".to_string());
    if !CATEGORIES.contains(&category.as_str()) {
        errors.push(FieldError {
            field: "category".into(),
            message: format!("Category must be one of: {}", CATEGORIES.join(", ")),
        });
    }

    let priority = body.priority.unwrap_or_else(|| "normal".to_string());
    if !PRIORITIES.contains(&priority.as_str()) {
        errors.push(FieldError {
            field: "priority".into(),
            message: format!("Priority must be one of: {}", PRIORITIES.join(", ")),
        });
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let now = Utc::now();
    let expires_at = body
        .expires_at
        .unwrap_or_else(|| now + Duration::days(DEFAULT_EXPIRY_DAYS));
    if expires_at <= now {
        return Err(ApiError::bad_request("Expiry must be in the future"));
    }

    let mut conn = state.db.get().await?;

    let author_name: String = diesel_async::RunQueryDsl::get_result(
        users::table.find(&user_id).select(users::full_name),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    let notice_id = board_common::id::prefixed_ulid(board_common::id::prefix::NOTICE);

    let notice: Notice = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(notices::table)
            .values(NewNotice {
                id: &notice_id,
                title: &title,
                content: &content,
                author_id: &user_id,
                category: &category,
                priority: &priority,
                is_pinned: false,
                expires_at,
                created_at: now,
                updated_at: now,
            })
            .returning(Notice::as_returning()),
        &mut conn,
    )
    .await?;

    let response = NoticeResponse::from_parts(notice, author_name);

    // Broadcast after the row is durable. Notices carry no origin: the
    // creator's other sessions see them too.
    state.gateway.publish(&BroadcastEvent::Notice {
        data: response.clone(),
    });

    Ok((StatusCode::CREATED, Json(response)))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/notices/{notice_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/notices/{notice_id}",
    tag = "Notices",
    security(("bearer" = [])),
    params(("notice_id" = String, Path, description = "Notice ID")),
    responses(
        (status = 204, description = "Notice deleted"),
        (status = 404, description = "Notice not found or not yours", body = ApiErrorBody),
    ),
)]
pub async fn delete_notice(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(notice_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;

    let deleted = diesel_async::RunQueryDsl::execute(
        diesel::delete(
            notices::table
                .filter(notices::id.eq(&notice_id))
                .filter(notices::author_id.eq(&user_id)),
        ),
        &mut conn,
    )
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found("Notice not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/notices/{notice_id}/pin
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct PinNoticeRequest {
    pub is_pinned: bool,
}

#[utoipa::path(
    patch,
    path = "/api/v1/notices/{notice_id}/pin",
    tag = "Notices",
    security(("bearer" = [])),
    params(("notice_id" = String, Path, description = "Notice ID")),
    request_body = PinNoticeRequest,
    responses(
        (status = 200, description = "Pin state updated", body = NoticeResponse),
        (status = 404, description = "Notice not found", body = ApiErrorBody),
    ),
)]
pub async fn pin_notice(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Path(notice_id): Path<String>,
    Json(body): Json<PinNoticeRequest>,
) -> Result<Json<NoticeResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let notice: Notice = diesel_async::RunQueryDsl::get_result(
        diesel::update(notices::table.find(&notice_id))
            .set((
                notices::is_pinned.eq(body.is_pinned),
                notices::updated_at.eq(Utc::now()),
            ))
            .returning(Notice::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Notice not found"))?;

    let author_name: String = diesel_async::RunQueryDsl::get_result(
        users::table.find(&notice.author_id).select(users::full_name),
        &mut conn,
    )
    .await
    .optional()?
    .unwrap_or_else(|| "Unknown User".to_string());

    Ok(Json(NoticeResponse::from_parts(notice, author_name)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/notices/stats
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct NoticeStatsResponse {
    pub total: i64,
    pub by_category: HashMap<String, i64>,
    pub by_priority: HashMap<String, i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notices/stats",
    tag = "Notices",
    responses(
        (status = 200, description = "Notice counts", body = NoticeStatsResponse),
    ),
)]
pub async fn notice_stats(
    State(state): State<AppState>,
) -> Result<Json<NoticeStatsResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let total: i64 =
        diesel_async::RunQueryDsl::get_result(notices::table.count(), &mut conn).await?;

    let by_category: Vec<(String, i64)> = diesel_async::RunQueryDsl::load(
        notices::table
            .group_by(notices::category)
            .select((notices::category, count_star())),
        &mut conn,
    )
    .await?;

    let by_priority: Vec<(String, i64)> = diesel_async::RunQueryDsl::load(
        notices::table
            .group_by(notices::priority)
            .select((notices::priority, count_star())),
        &mut conn,
    )
    .await?;

    Ok(Json(NoticeStatsResponse {
        total,
        by_category: by_category.into_iter().collect(),
        by_priority: by_priority.into_iter().collect(),
    }))
}

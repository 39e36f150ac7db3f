//! Auth routes: registration, email verification, and login.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError, OptionalExtension};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::auth::{password, tokens};
use crate::db::schema::users;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::{NewUser, User, UserResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify", get(verify_email))
        .route("/auth/login", post(login))
        .route("/users/@me", get(get_me))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub student_id: String,
    pub full_name: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, pending verification", body = UserResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Email or student ID already registered", body = ApiErrorBody),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    // --- Validation ---
    let mut errors: Vec<FieldError> = Vec::new();

    let email = body.email.trim().to_lowercase();
    if !is_allowed_email(&email, &state.config.allowed_email_domains) {
        errors.push(FieldError {
            field: "email".into(),
            message: "A campus email address is required".into(),
        });
    }

    let student_id = body.student_id.trim().to_string();
    if !is_valid_student_id(&student_id) {
        errors.push(FieldError {
            field: "student_id".into(),
            message: "Student ID must be exactly 9 digits".into(),
        });
    }

    let full_name = body.full_name.trim().to_string();
    if full_name.is_empty() || full_name.len() > 255 {
        errors.push(FieldError {
            field: "full_name".into(),
            message: "Full name must be 1–255 characters".into(),
        });
    }

    if body.password.len() < 8 {
        errors.push(FieldError {
            field: "password".into(),
            message: "Password must be at least 8 characters".into(),
        });
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let password_hash = password::hash_password(&body.password)?;
    let user_id = board_common::id::prefixed_ulid(board_common::id::prefix::USER);
    let verification_token = tokens::generate_verification_token();

    let mut conn = state.db.get().await?;

    let user: User = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(users::table)
            .values(NewUser {
                id: &user_id,
                email: &email,
                student_id: &student_id,
                full_name: &full_name,
                password_hash: &password_hash,
                is_verified: false,
                verification_token: Some(&verification_token),
                created_at: Utc::now(),
            })
            .returning(User::as_returning()),
        &mut conn,
    )
    .await
    .map_err(|e| match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ApiError::conflict("An account with this email or student ID already exists")
        }
        other => ApiError::from(other),
    })?;

    // Mail delivery runs out of process; the token is surfaced in the logs
    // so operators can hand out verification links manually.
    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        verification_token = %verification_token,
        "user registered, verification pending"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

// ---------------------------------------------------------------------------
// GET /api/v1/auth/verify?token=
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub verified: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    tag = "Auth",
    params(("token" = String, Query, description = "Verification token from the email link")),
    responses(
        (status = 200, description = "Account verified", body = VerifyResponse),
        (status = 400, description = "Invalid or expired token", body = ApiErrorBody),
    ),
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let updated: Option<User> = diesel_async::RunQueryDsl::get_result(
        diesel::update(users::table.filter(users::verification_token.eq(&params.token)))
            .set((
                users::is_verified.eq(true),
                users::verification_token.eq(None::<String>),
                users::updated_at.eq(Utc::now()),
            ))
            .returning(User::as_returning()),
        &mut conn,
    )
    .await
    .optional()?;

    let user = updated
        .ok_or_else(|| ApiError::bad_request("Invalid or expired verification token"))?;

    tracing::info!(user_id = %user.id, "email verified");

    Ok(Json(VerifyResponse { verified: true }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub ws_url: String,
    pub user: UserResponse,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ApiErrorBody),
        (status = 403, description = "Email not verified", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = body.email.trim().to_lowercase();

    let mut conn = state.db.get().await?;

    let user: User = diesel_async::RunQueryDsl::get_result(
        users::table
            .filter(users::email.eq(&email))
            .select(User::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    password::verify_password(&body.password, &user.password_hash)?;

    if !user.is_verified {
        return Err(ApiError::forbidden("Please verify your email address first"));
    }

    let access_token = tokens::mint_access_token(&state.config.jwt_secret, &user.id, &user.email)?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: (tokens::ACCESS_TOKEN_TTL_DAYS * 24 * 3600) as u64,
        ws_url: "/gateway".to_string(),
        user: UserResponse::from(user),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/@me
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users/@me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ApiErrorBody),
    ),
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let user: User = diesel_async::RunQueryDsl::get_result(
        users::table.find(&auth.user_id).select(User::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Whether the email has exactly one `@` and an allow-listed domain.
fn is_allowed_email(email: &str, allowed_domains: &[String]) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty() && allowed_domains.iter().any(|d| d == domain)
}

/// Student IDs are nine digits, e.g. `230401234`.
fn is_valid_student_id(student_id: &str) -> bool {
    student_id.len() == 9 && student_id.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<String> {
        vec!["college.edu".to_string(), "unilag.edu.ng".to_string()]
    }

    #[test]
    fn allowed_email_accepts_listed_domains() {
        assert!(is_allowed_email("ada@college.edu", &domains()));
        assert!(is_allowed_email("tunde@unilag.edu.ng", &domains()));
    }

    #[test]
    fn allowed_email_rejects_other_domains() {
        assert!(!is_allowed_email("ada@gmail.com", &domains()));
        assert!(!is_allowed_email("ada@sub.college.edu", &domains()));
    }

    #[test]
    fn allowed_email_rejects_malformed_addresses() {
        assert!(!is_allowed_email("no-at-sign", &domains()));
        assert!(!is_allowed_email("@college.edu", &domains()));
        assert!(!is_allowed_email("a@b@college.edu", &domains()));
    }

    #[test]
    fn student_id_must_be_nine_digits() {
        assert!(is_valid_student_id("230401234"));
        assert!(!is_valid_student_id("23040123"));
        assert!(!is_valid_student_id("2304012345"));
        assert!(!is_valid_student_id("23040123a"));
    }
}

pub mod auth;
pub mod chat;
pub mod health;
pub mod notices;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            auth::router()
                .merge(notices::router())
                .merge(chat::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth::register,
        auth::verify_email,
        auth::login,
        auth::get_me,
        // Notices
        notices::list_notices,
        notices::create_notice,
        notices::delete_notice,
        notices::pin_notice,
        notices::notice_stats,
        // Chat
        chat::list_messages,
        chat::send_message,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::user::UserResponse,
            crate::models::notice::NoticeResponse,
            crate::models::chat_message::ChatMessageResponse,
            // Route request/response types
            auth::RegisterRequest,
            auth::VerifyResponse,
            auth::LoginRequest,
            auth::LoginResponse,
            notices::CreateNoticeRequest,
            notices::PinNoticeRequest,
            notices::NoticeStatsResponse,
            chat::ListMessagesResponse,
            chat::SendMessageRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, verification, and login"),
        (name = "Notices", description = "Notice board"),
        (name = "Chat", description = "Live chat"),
    )
)]
pub struct ApiDoc;

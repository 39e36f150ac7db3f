use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::users;

/// A registered student account.
///
/// Never serialized directly — `password_hash` and `verification_token`
/// must not leave the server. Use [`UserResponse`] for API output.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub email: String,
    pub student_id: String,
    pub full_name: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub student_id: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub is_verified: bool,
    pub verification_token: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user account.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub student_id: String,
    pub full_name: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            student_id: user.student_id,
            full_name: user.full_name,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

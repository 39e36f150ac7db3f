pub mod chat_message;
pub mod notice;
pub mod user;

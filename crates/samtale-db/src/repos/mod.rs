pub mod conversation;
pub mod refresh_token;
pub mod user;

pub mod auth;
pub mod chat;
pub mod config;
pub mod llm;
pub mod mailer;
pub mod signup;
pub mod state;
pub mod textfmt;
pub mod ttl_cache;
pub mod web;

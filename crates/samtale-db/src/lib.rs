pub mod pool;
pub mod repos;

// Re-export commonly used items
pub use pool::{create_pool, run_migrations};
pub use repos::conversation::{ConversationRepo, ConversationRow, MessageRow};
pub use repos::refresh_token::{RefreshTokenRepo, RefreshTokenRow};
pub use repos::user::{UserRepo, UserRow};

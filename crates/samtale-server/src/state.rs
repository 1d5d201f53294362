use crate::config::ServerConfig;
use crate::llm::LlmClient;
use crate::mailer::Mailer;
use crate::signup::SignupStore;
use crate::ttl_cache::TtlCache;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub llm: Arc<dyn LlmClient>,
    /// Pending OTP signups, keyed by normalized email. Process-local.
    pub pending_signups: Arc<SignupStore>,
    /// Single-use remote logout tokens mapped to user ids. Process-local.
    pub logout_tokens: Arc<TtlCache<String, Uuid>>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: ServerConfig,
        mailer: Arc<dyn Mailer>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            mailer,
            llm,
            pending_signups: Arc::new(SignupStore::new()),
            logout_tokens: Arc::new(TtlCache::new()),
        }
    }
}

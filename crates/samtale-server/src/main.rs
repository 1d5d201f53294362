use anyhow::{Context, Result};
use samtale_db::{create_pool, run_migrations, UserRepo};
use samtale_server::auth::hash_password;
use samtale_server::config::load_config;
use samtale_server::llm::GeminiClient;
use samtale_server::mailer::{Mailer, NoopMailer, SmtpMailer};
use samtale_server::state::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Samtale server");

    // Load configuration
    let config_path =
        std::env::var("SAMTALE_CONFIG").unwrap_or_else(|_| "server-config.yaml".to_string());

    tracing::info!("Loading config from: {}", config_path);
    let config = load_config(&config_path)?;
    tracing::info!("Config loaded successfully");

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.db.url)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    // Seed initial admin if configured
    if let Some(admin) = &config.auth.initial_admin {
        match UserRepo::get_by_email(&pool, &admin.email).await {
            Ok(Some(_)) => {
                tracing::info!("Initial admin '{}' already exists, skipping seed", admin.email);
            }
            Ok(None) => {
                let password_hash = hash_password(&admin.password)
                    .context("Failed to hash initial admin password")?;
                let user_id = uuid::Uuid::new_v4();
                UserRepo::create(&pool, user_id, &admin.email, &password_hash, Some("Admin"))
                    .await
                    .context("Failed to create initial admin")?;
                UserRepo::set_admin(&pool, user_id, true)
                    .await
                    .context("Failed to set admin flag")?;
                tracing::info!("Created initial admin: {}", admin.email);
            }
            Err(e) => {
                tracing::warn!("Failed to check for initial admin: {}", e);
            }
        }
    }

    // Outgoing mail: SMTP when configured, otherwise log-only
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!("Using SMTP relay {}", smtp.host);
            Arc::new(SmtpMailer::new(smtp).context("Failed to build SMTP mailer")?)
        }
        None => {
            tracing::warn!("No SMTP configured, outgoing mail will only be logged");
            Arc::new(NoopMailer)
        }
    };

    // Model client
    let llm = Arc::new(GeminiClient::new(&config.llm).context("Failed to build model client")?);
    tracing::info!("Using model '{}'", config.llm.model);

    // Build application state
    let listen = config.listen.clone();
    let state = AppState::new(pool, config, mailer, llm);

    // Build router
    let app = samtale_server::web::build_router(state);

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;

    tracing::info!("Server listening on {}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping...");
}

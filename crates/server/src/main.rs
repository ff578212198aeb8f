use std::sync::Arc;

use anyhow::Context;
use db::DBService;
use server::{AppState, build_router, config::Config};
use services::services::{
    database_validator::DatabaseValidator,
    llm_client::{AnthropicClient, JsonCompletion},
    renewal_scheduler::RenewalScheduler,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let config = Config::from_env().context("loading configuration")?;

    let db = DBService::new_lazy(&config.database_url, config.database_max_connections)
        .context("creating database pool")?;
    if config.run_migrations {
        db.migrate().await.context("running migrations")?;
    }
    match DatabaseValidator::new(db.pool.clone()).validate().await {
        Ok(result) if result.is_ok() => info!("{}", result.summary()),
        Ok(result) => warn!("{}", result.summary()),
        Err(e) => warn!("Could not validate database schema: {}", e),
    }

    let llm: Option<Arc<dyn JsonCompletion>> = match config.anthropic_api_key {
        Some(key) => match AnthropicClient::new(key, config.anthropic_model.clone()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("AI summaries disabled: {}", e);
                None
            }
        },
        None => {
            info!("ANTHROPIC_API_KEY not set, AI summaries will use the fallback");
            None
        }
    };

    let _scheduler = RenewalScheduler::spawn(db.pool.clone(), config.renewal_scheduler_interval);

    let state = AppState::new(db, config.jwt_secret, llm, config.anthropic_model);
    let app = build_router(state, &config.cors_allowed_origins);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

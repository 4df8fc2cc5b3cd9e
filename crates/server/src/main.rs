mod api;
mod bootstrap;
mod classify;
mod flow;
mod health;
mod llm;
mod news;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tower_http::cors::CorsLayer;

use dicta_agent::llm::{ChatClient, OllamaChatClient};
use dicta_core::config::{AppConfig, LoadOptions};
use dicta_db::repositories::{SqlExecutionRepository, SqlNewsRepository};
use dicta_http::RetryPolicy;

fn init_logging(config: &AppConfig) {
    use dicta_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let chat_client: Arc<dyn ChatClient> = Arc::new(OllamaChatClient::new(
        app.http_client.clone(),
        app.config.llm.base_url.clone(),
        Duration::from_secs(app.config.llm.timeout_secs),
        RetryPolicy::with_retries(app.config.llm.max_retries),
    ));
    let repository = Arc::new(SqlExecutionRepository::new(app.db_pool.clone()));
    let news_repository = Arc::new(SqlNewsRepository::new(app.db_pool.clone()));

    let router = Router::new()
        .merge(flow::router(flow::FlowState::new(
            repository,
            app.http_client.clone(),
            &app.config.flows,
        )))
        .merge(news::router(news::NewsState::new(
            news_repository,
            app.http_client.clone(),
            &app.config.flows,
        )))
        .merge(classify::router(classify::ClassifyState::new(chat_client.clone(), &app.config.llm)))
        .merge(llm::router(llm::ChatState::new(chat_client, &app.config.llm)))
        .merge(health::router(health::HealthState::new(
            app.db_pool.clone(),
            app.http_client.clone(),
            &app.config,
        )))
        // Single trusted caller behind a local tunnel; CORS stays permissive.
        .layer(CorsLayer::permissive());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "dicta-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "dicta-server stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

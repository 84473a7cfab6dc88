//! # Quota Guard API Server
//!
//! Actix-web server enforcing IP and token rate limits in front of a small
//! demo API.

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::rate_limit::RateLimitMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env().context("Invalid configuration")?;

    tracing::info!(
        "Starting Quota Guard API Server on {}:{}",
        config.host,
        config.port
    );
    log_policies(&config);

    let state = AppState::new(&config)
        .await
        .context("Failed to initialize application state")?;

    let server_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(RateLimitMiddleware::new(
                server_state.limiter.clone(),
                server_state.api_key_header.clone(),
            ))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(server_state.clone()))
            .configure(handlers::configure_routes)
            .default_service(web::to(handlers::not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    state.shutdown().await;
    tracing::info!("Quota Guard API Server stopped");
    Ok(())
}

fn log_policies(config: &AppConfig) {
    let ip = &config.ip_policy;
    tracing::info!(
        backend = config.storage.name(),
        limit = ip.limit(),
        window = ?ip.window(),
        block = ?ip.block_duration(),
        token_policies = config.token_policies.len(),
        "IP rate limit"
    );
}

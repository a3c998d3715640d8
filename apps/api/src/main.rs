mod batch;
mod coaching;
mod config;
mod db;
mod errors;
mod jd;
mod llm_client;
mod models;
mod notify;
mod render;
mod resumes;
mod routes;
mod state;
mod storage;
mod store;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::batch::BatchItemProcessor;
use crate::coaching::{Coach, CoachingMode};
use crate::config::Config;
use crate::db::create_pool;
use crate::jd::HttpJdFetcher;
use crate::llm_client::LlmClient;
use crate::notify::WebhookNotifier;
use crate::render::LatexRenderer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3Storage;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL
    let store = Arc::new(PgStore::new(create_pool(&config.database_url).await?));

    // S3 / MinIO
    let storage = Arc::new(S3Storage::from_config(&config).await);
    info!("S3 storage initialized (bucket: {})", config.s3_bucket);

    // JD fetching
    let fetcher = Arc::new(HttpJdFetcher::new(config.jd_fetch_timeout)?);

    // Coaching
    let mode = if config.local_only_coaching {
        CoachingMode::LocalOnly
    } else {
        CoachingMode::Remote
    };
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {}, mode: {mode:?})", llm_client::MODEL);
    let coach = Coach::new(Some(Arc::new(llm)), mode);

    // PDF rendering
    let renderer = Arc::new(LatexRenderer::new(config.latex_bin.clone()));
    info!("PDF renderer: {}", config.latex_bin);

    let mut processor = BatchItemProcessor::new(
        store.clone(),
        fetcher.clone(),
        coach.clone(),
        renderer,
        storage,
    );
    if let Some(endpoint) = &config.webhook_url {
        processor = processor.with_notifier(Arc::new(WebhookNotifier::new(endpoint.clone())?));
        info!("Item webhooks enabled: {endpoint}");
    }

    let state = AppState {
        store,
        fetcher,
        coach,
        processor: Arc::new(processor),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

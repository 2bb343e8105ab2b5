mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod quiz;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::pipeline::catalog::CatalogCandidateSource;
use crate::pipeline::engine::Orchestrator;
use crate::pipeline::generative::LlmStepPort;
use crate::pipeline::graph::GraphShape;
use crate::pipeline::nodes::{NodeSettings, Nodes};
use crate::pipeline::session::RedisSessionStore;
use crate::quiz::bank::QuizBank;
use crate::quiz::progress::PgProgressStore;
use crate::quiz::QuizService;
use crate::routes::build_router;
use crate::state::AppState;

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

    info!("Starting Upskill API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL (XP and badges)
    let db = create_pool(&config.database_url).await?;
    let progress = Arc::new(PgProgressStore::new(db));

    // Redis (session snapshots)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let sessions = Arc::new(
        RedisSessionStore::connect(&redis, config.session_ttl_secs)
            .await
            .context("Failed to connect to Redis")?,
    );
    info!(
        "Redis session store ready (ttl {}s)",
        config.session_ttl_secs
    );

    // LLM client; each HTTP attempt is bounded by the step timeout
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.step_timeout)?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let port = Arc::new(LlmStepPort::new(llm));

    // Course catalog and quiz bank
    let catalog = CatalogCandidateSource::from_path(&config.course_catalog_path)?;
    if catalog.is_empty() {
        warn!("Course catalog is empty; course recommendations will find nothing");
    }
    let catalog = Arc::new(catalog);
    let bank = QuizBank::from_path(&config.quiz_bank_path)?;

    let nodes = Nodes::new(
        port.clone(),
        catalog,
        NodeSettings {
            step_timeout: config.step_timeout,
            retrieval_top_k: config.retrieval_top_k,
            default_module_price: config.default_module_price_eur,
        },
    );

    let state = AppState {
        linear: Arc::new(Orchestrator::new(
            GraphShape::Linear,
            nodes.clone(),
            sessions.clone(),
        )),
        chat: Arc::new(Orchestrator::new(GraphShape::IntentRouted, nodes, sessions)),
        quiz: Arc::new(QuizService::new(bank, port, progress, config.step_timeout)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

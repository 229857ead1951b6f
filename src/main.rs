//! Astro Consult server
//!
//! Serves the triage, queue, chat and knowledge-base API over HTTP.

use astro_consult::api::{create_router, AppState};
use astro_consult::db::{db_path_from_env, Database};
use astro_consult::embeddings::{EmbedderChain, EmbeddingConfig};
use astro_consult::llm::{GeneratorChain, LlmConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astro_consult=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = db_path_from_env();

    let port: u16 = std::env::var("ASTRO_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    // Ensure database directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path)?;

    // Text generation
    let generator = GeneratorChain::new(&LlmConfig::from_env());
    if generator.has_providers() {
        tracing::info!(providers = ?generator.provider_names(), "Text generation initialized");
    } else {
        tracing::warn!(
            "No generation backend configured. Set LOCAL_GPT4ALL_URL or HUGGINGFACE_API_KEY; using canned replies."
        );
    }

    // Embeddings
    let embedder = EmbedderChain::new(&EmbeddingConfig::from_env());
    if !embedder.has_providers() {
        tracing::warn!("No embedding backend configured; knowledge-base retrieval is disabled.");
    }

    // Create application state
    let state = AppState::new(db, Arc::new(generator), Arc::new(embedder));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Astro Consult server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

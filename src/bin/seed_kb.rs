//! Load the built-in knowledge-base documents into the database.
//!
//! Safe to rerun: documents whose title is already stored are skipped.

use astro_consult::db::{db_path_from_env, Database};
use astro_consult::embeddings::{EmbedderChain, EmbeddingConfig};
use astro_consult::knowledge::seed_knowledge_base;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astro_consult=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = db_path_from_env();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path)?;

    let embedder = EmbedderChain::new(&EmbeddingConfig::from_env());
    if !embedder.has_providers() {
        tracing::warn!("No embedding backend configured; chunks will get zero vectors");
    }

    let report = seed_knowledge_base(&db, &embedder).await?;
    tracing::info!(
        docs = report.docs,
        chunks = report.chunks,
        skipped = report.skipped,
        "Knowledge base seeded"
    );

    Ok(())
}

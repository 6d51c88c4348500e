//! docbase: document management and AI assistant server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use docbase_server::{routes, AppState};

fn resolve_data_dir() -> PathBuf {
    std::env::var("DOCBASE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = docbase_core::AppConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = Arc::new(
        docbase_store::Store::open(&config.data_paths.db)
            .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?,
    );

    let embedder = Arc::new(docbase_rag::RemoteEmbedder::new(&config.embedding));
    let generator = Arc::new(docbase_chat::RemoteGenerator::new(&config.generation));
    let ocr_client = Arc::new(docbase_ocr::RemoteOcr::new(&config.ocr));

    info!(
        "Embedding model: {} at {}",
        config.embedding.model, config.embedding.endpoint
    );
    info!(
        "Generation model: {} at {}",
        config.generation.model, config.generation.endpoint
    );

    let state = Arc::new(AppState::new(
        config, store, embedder, generator, ocr_client,
    ));

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("docbase server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

mod config;
mod db;
mod errors;
mod interview;
mod knowledge;
mod llm_client;
mod models;
mod retrieval;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::interview::{LocalTurnLock, PgSessionStore, RedisTurnLock, TurnLock};
use crate::knowledge::PgResumeStore;
use crate::llm_client::{Embedder, HttpEmbedder, LlmClient};
use crate::retrieval::PgVectorIndex;
use crate::routes::build_router;
use crate::state::{AppState, Backends};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let mut backends = Backends::in_memory(Arc::new(llm));

    // Embeddings: hosted model when a key is configured, hashing embedder otherwise
    if let Some(api_key) = &config.embedding_api_key {
        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(
            &config.embedding_api_url,
            api_key.clone(),
            config.embedding_model.clone(),
        ));
        backends.embedder = embedder;
        info!("Embedding client initialized (model: {})", config.embedding_model);
    } else {
        warn!("EMBEDDING_API_KEY not set; using the local hashing embedder");
    }

    // Initialize PostgreSQL
    match &config.database_url {
        Some(url) => {
            let db = create_pool(url).await?;
            backends.resumes = Arc::new(PgResumeStore::new(db.clone()));
            backends.sessions = Arc::new(PgSessionStore::new(db.clone()));
            backends.index = Arc::new(PgVectorIndex::new(db));
        }
        None => warn!("DATABASE_URL not set; resumes and sessions are kept in memory"),
    }

    // Initialize Redis
    let lock: Arc<dyn TurnLock> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis client initialized");
            Arc::new(RedisTurnLock::new(client, config.turn_lock_ttl))
        }
        None => {
            warn!("REDIS_URL not set; turn locking is process-local");
            Arc::new(LocalTurnLock::default())
        }
    };
    backends.lock = lock;

    info!(
        "Interviews run {} technical questions, {}s per pipeline stage",
        config.total_questions,
        config.stage_timeout.as_secs()
    );

    // Build app state
    let state = AppState::assemble(backends, config.total_questions, config.stage_timeout);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

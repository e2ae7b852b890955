use docqa::api::{create_router, AppState};
use docqa::application::SessionRegistry;
use docqa::infrastructure::{llm, AppConfig, TextEmbedding};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api=debug,docqa=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;

    let embedder = Arc::new(TextEmbedding::from_config(&config.config.embedding)?);
    let llm = llm::from_config(&config.config.llm)?;
    info!(
        llm = %config.config.llm.model,
        embedding = %config.config.embedding.model,
        index_dir = ?config.config.storage.index_dir,
        "providers configured"
    );

    let pipeline = config.pipeline(embedder, llm)?;
    let addr = SocketAddr::new(config.config.server.host.parse()?, config.config.server.port);

    let state = AppState::new(SessionRegistry::new(pipeline), config);
    let app = create_router(state);

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

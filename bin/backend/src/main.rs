use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use ragbox_backend::SessionManager;
use ragbox_rag::{Captioner, EmbeddingClient, HttpCaptioner, LlmSynthesizer};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod endpoint;
use endpoint::create_router;

// Environment variables
static BACKEND_HOST: std::sync::LazyLock<String> = std::sync::LazyLock::new(|| {
    std::env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
});
static BACKEND_PORT: std::sync::LazyLock<String> = std::sync::LazyLock::new(|| {
    std::env::var("BACKEND_PORT").unwrap_or_else(|_| "8000".to_string())
});

#[derive(Parser)]
#[command(name = "backend")]
#[command(about = "Web backend for chatting with uploaded PDF documents")]
struct Cli {
    /// Skip the hosted image-captioning model (image chunks are dropped)
    #[arg(long)]
    no_captions: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("loading embedding model");
    let embeddings = Arc::new(
        EmbeddingClient::new()
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let answer_backend = Arc::new(LlmSynthesizer::from_env());

    let captioner: Option<Arc<dyn Captioner>> = if cli.no_captions {
        None
    } else {
        match HttpCaptioner::from_env() {
            Ok(captioner) => Some(Arc::new(captioner)),
            Err(e) => {
                warn!(error = %e, "captioning client unavailable, image chunks disabled");
                None
            }
        }
    };

    let session_manager = Arc::new(SessionManager::new(embeddings, answer_backend, captioner));

    let app = create_router(session_manager).layer(build_cors_layer());

    let host = &*BACKEND_HOST;
    let port = &*BACKEND_PORT;
    let bind_addr = format!("{}:{}", host, port);

    println!("🚀 Backend server starting on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

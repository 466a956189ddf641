//! Safewatch Server - Main Entry Point

use safewatch::{server, AnalyzerConfig, SafetyAnalyzer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Safewatch v{}", env!("CARGO_PKG_VERSION"));

    let config = AnalyzerConfig::from_env();
    let addr = config.server.bind_addr();

    // Model synthesis is CPU-bound
    let analyzer = tokio::task::spawn_blocking(move || {
        let mut analyzer = SafetyAnalyzer::new(config);
        analyzer.initialize();
        analyzer
    })
    .await?;
    let analyzer = Arc::new(analyzer);

    analyzer.learner().start();

    let app = server::build_router(analyzer);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

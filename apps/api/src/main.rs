mod config;
mod controller;
mod document;
mod errors;
mod fonts;
mod llm_client;
mod prompts;
mod render;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::controller::{Controller, SessionStore};
use crate::document::{DocumentPreprocessor, PdftoppmRasterizer};
use crate::fonts::FontStore;
use crate::llm_client::GeminiClient;
use crate::render::PageConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing GOOGLE_API_KEY)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume-ats v{}", env!("CARGO_PKG_VERSION"));

    let http = reqwest::Client::new();

    // Font is fetched once; a failure here only disables PDF output until a later retry.
    let fonts = Arc::new(FontStore::new(
        config.font_path.clone(),
        config.font_url.clone(),
        http.clone(),
    ));
    match fonts.get().await {
        Ok(font) => info!("PDF font ready: {}", font.name),
        Err(e) => warn!("PDF font not ready, will retry on first PDF request: {e}"),
    }

    // Initialize document preprocessor
    let preprocessor =
        DocumentPreprocessor::new(config.input_mode, Arc::new(PdftoppmRasterizer::default()));
    info!("Document preprocessor ready (mode: {:?})", preprocessor.mode());

    // Initialize model gateway
    let gateway = GeminiClient::new(&config, http);
    info!("Model gateway initialized (model: {})", gateway.model());

    let controller = Controller::new(Arc::new(gateway), preprocessor, fonts, PageConfig::a4())
        .with_glyph_policy(config.glyph_policy);

    // Build app state
    let state = AppState {
        config: config.clone(),
        controller: Arc::new(controller),
        sessions: SessionStore::new(),
    };

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

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod audio;
mod config;
mod error;
mod gateway;
mod synth;
mod templates;

use api::routes::{create_router, AppState};
use config::ServerConfig;
use gateway::{ConversionGateway, OUTPUT_FILE_NAME};
use synth::SubprocessSynthesizer;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid address");

    // Create synthesizer
    let synth = SubprocessSynthesizer::new(config.synth_program.clone(), config.synth_args.clone())
        .with_timeout(config.synth_timeout());

    tracing::info!("Conversation audio server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Audio directory: {}", config.audio_dir.display());
    tracing::info!("Views directory: {}", config.views_dir.display());
    tracing::info!("Synthesizer: {}", synth.command_line());

    // Create app state
    let gateway = ConversionGateway::new(
        Arc::new(synth),
        config.audio_dir.join(OUTPUT_FILE_NAME),
    );
    tracing::info!("Audio output: {}", gateway.output_path().display());

    let state = Arc::new(AppState {
        gateway,
        audio_dir: config.audio_dir,
        views_dir: config.views_dir,
    });

    // Create router
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

use anyhow::{Context, Result};
use clap::Parser;
use parla_practice::{
    create_router, AppState, CoinLedger, Config, FileProgressTracker, HttpGrader, HttpSttClient,
    JsonFileStore, LocalAudioStore, PracticePipeline, StaticEntitlement,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "parla-practice", about = "Spoken-language practice service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/parla-practice")]
    config: String,

    /// Override the configured HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let entitlement = Arc::new(StaticEntitlement::new(cfg.ledger.unlimited));
    let ledger = Arc::new(CoinLedger::load(
        Box::new(JsonFileStore::new(&cfg.ledger.path)),
        entitlement,
    ));

    let store = Arc::new(LocalAudioStore::new(&cfg.storage.uploads_path));
    let stt = Arc::new(HttpSttClient::new(
        &cfg.stt.url,
        Duration::from_secs(cfg.stt.timeout_secs),
    )?);
    let grader = Arc::new(HttpGrader::new(
        &cfg.grading.url,
        Duration::from_secs(cfg.grading.timeout_secs),
        &cfg.grading.native_language,
        &cfg.grading.target_language,
    )?);
    let progress = Arc::new(FileProgressTracker::load(&cfg.progress.path));

    let pipeline = Arc::new(PracticePipeline::new(ledger, store, stt, grader, progress));

    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", cfg.service.http.bind, port);

    let router = create_router(AppState::new(pipeline));

    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    Ok(())
}

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use screen_insight::{
    create_router, forward_capture_events, AppState, CaptureSettings, Config, InferenceClient,
    MemoryStore, SessionOrchestrator, UnsupportedPlatform,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// File the AI settings are persisted to, inside the recordings directory
const AI_CONFIG_FILE: &str = "ai-config.json";

#[derive(Parser)]
#[command(name = "screen-insight")]
#[command(about = "Screen recording sessions with Gemini analysis")]
struct Args {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/screen-insight")]
    config: String,

    /// Gemini API key, overriding the configured one
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Upload a local file and print its remote handle
    Upload { file: PathBuf },

    /// Wait until an uploaded file is ready for analysis
    Status { uri: String },

    /// Ask a question about one or more uploaded files
    Analyze {
        /// Remote handle; may be repeated
        #[arg(long = "uri", required = true)]
        uris: Vec<String>,

        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let mut ai = cfg.ai.clone();
    if let Some(key) = args.api_key {
        ai.api_key = key;
    }

    let inference = InferenceClient::from_config(&cfg.gemini)?;

    match args.command {
        Command::Serve => serve(cfg, inference, ai).await,
        Command::Upload { file } => {
            let handle = inference.uploader().upload(&file, &ai.api_key).await?;
            println!("{}", handle);
            Ok(())
        }
        Command::Status { uri } => {
            if inference.uploader().wait_until_active(&uri, &ai.api_key).await {
                println!("ACTIVE");
                Ok(())
            } else {
                bail!("File {} did not become active", uri)
            }
        }
        Command::Analyze { uris, prompt } => {
            let answer = inference.analyze(&uris, &prompt, &ai).await?;
            println!("{}", answer);
            Ok(())
        }
    }
}

async fn serve(cfg: Config, inference: InferenceClient, ai: screen_insight::AiConfig) -> Result<()> {
    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Recordings directory: {}", cfg.capture.output_dir.display());

    let store = Arc::new(MemoryStore::with_config_file(
        cfg.capture.output_dir.join(AI_CONFIG_FILE),
    ));
    let (orchestrator, events) = SessionOrchestrator::new(
        store,
        inference,
        Arc::new(UnsupportedPlatform),
        CaptureSettings::from(&cfg.capture),
        ai,
    );
    let orchestrator = Arc::new(orchestrator);

    tokio::spawn(forward_capture_events(orchestrator.clone(), events));

    let app = create_router(AppState::new(orchestrator));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("HTTP server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

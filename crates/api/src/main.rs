use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod metrics;
mod routes;

use config::{AppConfig, LogFormat};
use metrics::Metrics;
use routes::AppState;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "Server crashed");
        eprintln!("Server crashed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    for env_file in config::load_env_files(Path::new(".")) {
        eprintln!("Loaded environment from {}", env_file.display());
    }

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    if config.llm.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; graph requests will be rejected until it is configured");
    }
    info!(
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        output_language = config.llm.output_language.as_deref().unwrap_or("source"),
        "LLM configured"
    );

    let state = Arc::new(AppState {
        extractor: extract::Extractor::from_config(&config.llm),
        metrics: Metrics::new(),
    });

    let dist_dir = config.dist_dir.is_dir().then_some(config.dist_dir.as_path());
    match dist_dir {
        Some(dir) => info!(path = %dir.display(), "Serving frontend bundle"),
        None => info!(path = %config.dist_dir.display(), "No frontend bundle found, serving API only"),
    }

    let app = routes::router(state, dist_dir);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server encountered a fatal error")?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.with_target(false).compact().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!(error = %err, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

//! envcam service - sensor and camera ingestion with CSV/ZIP export.
//!
//! Run with: `cargo run -p envcam-service`

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use envcam_service::{AppState, Config};
use envcam_store::ReadingStore;

/// envcam service - HTTP ingestion and export of sensor readings and camera images.
#[derive(Parser, Debug)]
#[command(name = "envcam-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Image directory (overrides config).
    #[arg(short, long)]
    images: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("envcam_service=info".parse()?)
                .add_directive("envcam_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default(),
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(database) = args.database {
        config.storage.database = database;
    }
    if let Some(images) = args.images {
        config.storage.images = images;
    }
    config.validate()?;

    let readings = ReadingStore::open(&config.storage.database)?;
    info!("Storing images under {:?}", config.storage.images);

    let addr: SocketAddr = config.server.bind.parse()?;
    let state = AppState::new(readings, config)?;
    let app = envcam_service::app(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

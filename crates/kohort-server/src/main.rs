//! kohort server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), layers
//! `KOHORT_*` environment variables and CLI flags on top, opens the
//! configured experiment store, and serves the JSON API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use kohort_core::memory::MemoryStore;
use kohort_server::{ServerConfig, StoreBackend, expand_tilde};
use kohort_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Kohort experiment assignment server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Override the configured listen host.
  #[arg(long)]
  host: Option<String>,

  /// Override the configured listen port.
  #[arg(short, long)]
  port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("KOHORT"))
    .set_override_option("host", cli.host)?
    .set_override_option("port", cli.port.map(i64::from))?
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let app = match server_cfg.store {
    StoreBackend::Memory => {
      tracing::warn!("using in-memory store; experiments are lost on restart");
      kohort_server::app(Arc::new(MemoryStore::new()))
    }
    StoreBackend::Sqlite => {
      // Expand `~` in store path.
      let store_path = expand_tilde(&server_cfg.store_path);
      let store = SqliteStore::open(&store_path)
        .await
        .with_context(|| format!("failed to open store at {store_path:?}"))?;
      tracing::info!(path = ?store_path, "opened sqlite store");
      kohort_server::app(Arc::new(store))
    }
  };

  let address = server_cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

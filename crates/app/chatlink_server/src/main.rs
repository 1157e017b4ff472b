//! Chatlink HTTP server binary.
//!
//! Serves the chat RPC methods, entry pages and host hooks for one host
//! installation.

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chatlink_api::config::{ApiConfig, TokenStoreKind};
use chatlink_core::backend::RestConnector;
use chatlink_core::crypto::SecretBox;
use chatlink_core::host::FileHostDirectory;
use chatlink_core::redact::Redactor;
use chatlink_core::service::ChatService;
use chatlink_core::settings::{FileSettingsStore, Settings};
use clap::Parser;
use tracing::info;

/// How often expired server-side tokens are dropped.
const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// CLI arguments. Anything not given falls back to `ApiConfig::from_env`.
#[derive(Parser, Debug)]
#[command(name = "chatlink_server", about = "Chatlink HTTP server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// Module settings file (YAML).
    #[arg(long, env = "CHATLINK_SETTINGS")]
    settings: Option<PathBuf>,

    /// Host directory file (YAML).
    #[arg(long, env = "CHATLINK_HOST_DIRECTORY")]
    host_directory: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let redactor = Redactor::new();
    logging::init(redactor.clone());

    let args = Args::parse();
    let mut config = ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(path) = args.settings {
        config.settings_path = path.display().to_string();
    }
    if let Some(path) = args.host_directory {
        config.host_directory_path = path.display().to_string();
    }

    info!(
        settings = %config.settings_path,
        host_directory = %config.host_directory_path,
        token_store = ?config.token_store,
        "starting chatlink_server"
    );

    redactor.add_secret(&config.encryption_key);
    let secrets = SecretBox::new(&config.encryption_key);

    let settings = Settings::load(Arc::new(FileSettingsStore::new(&config.settings_path))).await?;
    let host = FileHostDirectory::load(Path::new(&config.host_directory_path))?;
    let connector = RestConnector::new(config.backend_timeout)?;

    let service = ChatService::new(
        settings,
        Arc::new(host),
        Arc::new(connector),
        secrets,
        redactor,
    );
    let state = chatlink_api::AppState::new(service, config.clone());

    if config.token_store == TokenStoreKind::Attribute {
        let attributes = state.attributes.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(TOKEN_CLEANUP_INTERVAL);
            loop {
                tick.tick().await;
                attributes.cleanup().await;
            }
        });
    }

    let app = chatlink_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}

// src/main.rs
//! Binary entrypoint; see `lib.rs` for the crate itself.

use stowage::api;
use stowage::config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let app_config = AppConfig::from_env();

    println!("🚀 Stowage service starting...");
    api::start_api_server(app_config.api, app_config.planner).await;
}

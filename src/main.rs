use std::sync::Arc;

use filedrop::sys_config::Config;
use filedrop::sys_core::{AppState, run_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env_config()?;
    info!(
        upload_dir = %config.upload_dir.display(),
        metadata_file = %config.metadata_file.display(),
        expiry_secs = config.expiry_secs,
        "starting filedrop"
    );

    let state = Arc::new(AppState::open(config).await?);
    run_server(state).await
}

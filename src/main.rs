use anyhow::Result;
use itmdns::reconcile::Reconciler;
use log::info;
use std::env;

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let config_file = env::var("ITM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let reconciler = Reconciler::from_file(&config_file)?;

    if let Ok(prefix) = env::var("ITM_SWEEP_PREFIX") {
        let swept = reconciler.sweep(&prefix).await?;
        info!("Swept {} DNS apps with prefix \"{}\"", swept, prefix);
        return Ok(());
    }

    reconciler.run().await
}

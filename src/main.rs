use anyhow::Context;
use fetchgate::{config::AppConfig, init_server, init_tracing, metrics::MetricsService};
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Optional YAML file; FETCHGATE__* env vars override it
    let config_path = env::args().nth(1).map(PathBuf::from);

    let config = AppConfig::load(config_path.as_deref()).with_context(|| {
        format!(
            "Failed to load configuration (usage: fetchgate [config_file]), path: {:?}",
            config_path
        )
    })?;

    let metrics = MetricsService::new().context("Failed to initialize metrics")?;

    init_server(config, Some(metrics))
        .await
        .context("Fetchgate error")?;

    Ok(())
}

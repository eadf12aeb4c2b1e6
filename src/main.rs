use anyhow::{Context, Result};

use hac_grades::backend::BrowserlessClient;
use hac_grades::{logging, metadata, Config, UpdateCoordinator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::from_env(),
    };
    logging::init(config.verbose_logging);

    let backend = BrowserlessClient::new(&config.browserless_url)
        .context("failed to build browserless client")?;
    let mut coordinator = UpdateCoordinator::new(backend, config);

    let view = coordinator.refresh().await.context("fetch failed")?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    if let Some(result) = coordinator.last_result() {
        let registry = metadata::build_registry(result);
        eprintln!("{}", serde_json::to_string_pretty(&registry)?);
    }

    Ok(())
}

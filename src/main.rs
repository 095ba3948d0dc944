use std::path::Path;

use gatehouse::{config, observability, Gatehouse};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gatehouse.yml".to_string());

    let config = config::load_config(Path::new(&config_path))?;

    observability::logging::init(&config.logging);

    tracing::info!(
        config = %config_path,
        service_type = %config.global.service_type,
        "gatehouse starting"
    );

    let gatehouse = Gatehouse::new(config, Vec::new()).await?;
    gatehouse.run().await
}

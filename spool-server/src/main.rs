use anyhow::Result;
use spool_server::config::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let addr = config.http_addr();
    let app = spool_server::build(&config).await?;

    tracing::info!("[spool] listening on http://{addr}");

    app.listen(addr).await?;

    Ok(())
}

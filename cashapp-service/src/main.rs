use cashapp_service::config::CashappConfig;
use cashapp_service::startup::Application;
use dotenvy::dotenv;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = CashappConfig::from_env().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())))
        .with(fmt::layer())
        .init();

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}

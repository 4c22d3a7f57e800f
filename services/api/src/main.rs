use portal_api::config::Config;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set, ephemeral key requests will fail");
    }

    portal_api::serve(config).await
}

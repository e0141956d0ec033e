use scandesk_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = scandesk_api::setup::initialize_app(config.clone()).await?;

    let served = scandesk_api::setup::server::start_server(&config, router).await;

    // Drain the ingestion queue and stop device polling before exiting.
    state.scanner.shutdown().await;
    tracing::info!("Scanner session stopped");

    served
}

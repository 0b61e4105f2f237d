use company_research_agent::{api::start_server, config::AppConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("Company Research Agent - API Server");
    info!(port = config.port, max_iterations = config.max_iterations, "Configuration loaded");

    let orchestrator = Arc::new(config.build_orchestrator()?);

    info!("Orchestrator initialized");

    start_server(orchestrator, config.port).await?;

    Ok(())
}

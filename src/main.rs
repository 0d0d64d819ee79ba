//! Samarth - AI-powered agricultural data analytics API.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use samarth::analytics::{InsightGenerator, QueryHistory, QueryOrchestrator};
use samarth::api::{self, AppState};
use samarth::cli::Cli;
use samarth::config::Config;
use samarth::error::ServiceError;
use samarth::{db, llm, logging};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match e.downcast_ref::<ServiceError>() {
            Some(service_error) => eprintln!("{}", service_error),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let config_path = cli.config_path();
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_overrides()?;
    cli.apply_to(&mut config);
    config.validate()?;

    logging::init_logging(&config.logging);
    info!(
        config = %config_path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting Project Samarth API"
    );

    info!(database = %config.database.display_url(), "Connecting to database");
    let database = db::connect(&config.database).await?;

    let client = match llm::create_client(&config.llm) {
        Ok(client) => {
            info!(
                provider = %config.llm.provider,
                model = client.model_name(),
                "AI service initialized"
            );
            Some(client)
        }
        Err(e) => {
            warn!(error = %e, "Failed to initialize AI service");
            None
        }
    };

    let generator = InsightGenerator::from_config(
        client,
        Arc::clone(&database),
        &config.analytics,
        &config.database,
    );
    let orchestrator = QueryOrchestrator::new(Arc::new(generator));
    let history = Arc::new(QueryHistory::new(config.analytics.history_capacity));
    let state = AppState::new(orchestrator, history, Arc::clone(&database));

    let served = api::serve(state, &config.server).await;

    info!("Shutting down Project Samarth API");
    database.close().await.context("Failed to close database")?;
    served?;

    Ok(())
}

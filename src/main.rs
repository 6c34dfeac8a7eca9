//! Service entry point
//!
//! Loads `.env` files and configuration, installs logging, then starts the
//! service and runs it until Ctrl-C.

use corelink::bootstrap::{Application, ApplicationOptions};
use corelink::config::{load_config, load_dotenv};
use corelink::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    load_dotenv();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.log.level, settings.log.file.as_deref());

    if let Err(e) = run_server(ApplicationOptions {
        settings,
        ..ApplicationOptions::default()
    })
    .await
    {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run_server(options: ApplicationOptions) -> Result<(), Box<dyn std::error::Error>> {
    let running = Application::new(options)?.run().await?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received. Exiting gracefully."),
        Err(e) => error!("Could not listen for the shutdown signal: {e}"),
    }

    running.shutdown().await?;
    Ok(())
}

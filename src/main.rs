use tracing::{error, info};
use urlshot::{setup_logging, Cli, CliRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse CLI arguments
    let args = Cli::parse_args();

    // Setup logging
    setup_logging(args.verbose)?;

    info!("Starting urlshot v{}", env!("CARGO_PKG_VERSION"));

    // Configuration problems abort before any capture starts
    let runner = match CliRunner::new(&args).await {
        Ok(runner) => runner,
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Per-URL failures are logged by the workers and never change the exit code
    runner.run().await;

    info!("urlshot finished");
    Ok(())
}

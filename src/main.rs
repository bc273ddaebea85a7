use clap::Parser;
use quote_sync::cli::{show_status, Cli, Commands};
use quote_sync::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    quote_sync::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting quote sync");
            args.execute(&config).await?;
        }
        Commands::Session(args) => {
            args.execute(&config)?;
        }
        Commands::Status => {
            show_status(&config)?;
        }
        Commands::Config => {
            println!("Current configuration:");
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

use clap::Parser;
use poly_lock::cli::{print_status, Cli, Commands};
use poly_lock::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_example(&cli.config)?;

    // Initialize telemetry
    let _telemetry = poly_lock::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            args.execute(&config).await?;
        }
        Commands::Status => {
            print_status(&config).await?;
        }
        Commands::Config => {
            println!("Configuration from {}:", cli.config);
            println!("{config:#?}");
        }
    }

    Ok(())
}

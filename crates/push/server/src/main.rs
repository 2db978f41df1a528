use clap::Parser as _;
use color_eyre::eyre::WrapErr as _;
use push_server::cli::{Cli, Commands};
use push_server::commands;
use push_server::config::Config;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).wrap_err("failed to load config")?;

    match cli.command {
        Commands::Migrate => commands::migrate(&config)?,
        Commands::Import(args) => {
            let stored = commands::import(&config, &args)?;
            println!("Imported {stored} installations");
        }
        Commands::Send(args) => {
            let summary = commands::send(&config, &args).await?;
            println!(
                "Sent {} batches ({} ok, {} failed); reconciled {} tasks ({} failed)",
                summary.batches,
                summary.succeeded,
                summary.failed,
                summary.reconciled.completed,
                summary.reconciled.failed
            );
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{
    BathroomCommand, ConfigCommand, FoodCommand, Session, TherapyCommand, WatchCommand,
    WaterCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "habit")]
#[command(version)]
#[command(about = "Track water, food, bathroom visits and therapy sessions", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log sync activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log and review water intake
    Water(WaterCommand),

    /// Log and review food
    Food(FoodCommand),

    /// Log and review bathroom visits
    Bathroom(BathroomCommand),

    /// Log and review therapy sessions
    Therapy(TherapyCommand),

    /// Follow a collection live
    Watch(WatchCommand),

    /// Show server configuration and reachability
    Status,

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Water(cmd)) => {
            let session = Session::from_config(&config)?;
            cmd.run(&session, &config).await?;
        }
        Some(Commands::Food(cmd)) => {
            let session = Session::from_config(&config)?;
            cmd.run(&session).await?;
        }
        Some(Commands::Bathroom(cmd)) => {
            let session = Session::from_config(&config)?;
            cmd.run(&session).await?;
        }
        Some(Commands::Therapy(cmd)) => {
            let session = Session::from_config(&config)?;
            cmd.run(&session).await?;
        }
        Some(Commands::Watch(cmd)) => {
            let session = Session::from_config(&config)?;
            cmd.run(&session).await?;
        }
        Some(Commands::Status) => {
            commands::status::run(&config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Library logs stay quiet unless asked for; `RUST_LOG` always wins.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "habit_sync=debug"
    } else {
        "habit_sync=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

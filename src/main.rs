//! Javelin - Fast Java dependency manager
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use javelin::cli::{Cli, Commands};
use javelin::config::ConfigManager;
use javelin::error::JavelinResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> JavelinResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("javelin=warn"),
        1 => EnvFilter::new("javelin=info"),
        _ => EnvFilter::new("javelin=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    // Dispatch to command
    match cli.command {
        Commands::Install(args) => javelin::cli::commands::install(args, &config).await,
        Commands::Add(args) => javelin::cli::commands::add(args, &config).await,
        Commands::Remove(args) => javelin::cli::commands::remove(args, &config).await,
        Commands::Update(args) => javelin::cli::commands::update(args, &config).await,
        Commands::Tree(args) => javelin::cli::commands::tree(args, &config).await,
    }
}

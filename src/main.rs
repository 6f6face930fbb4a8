//! Foreman CLI entry point.

use anyhow::Result;
use clap::Parser;

use foreman::cli::{commands, Cli, Commands};
use foreman::domain::models::Config;
use foreman::infrastructure::config::ConfigLoader;
use foreman::infrastructure::logging::LoggerImpl;

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if !cli.verbose && !cli.command.is_daemon() && config.logging.log_dir.is_none() {
        config.logging.level = "warn".to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => foreman::cli::handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => foreman::cli::handle_error(err, cli.json),
    };

    let json = cli.json;
    let result = match cli.command {
        Commands::Daemon(args) => commands::daemon::execute(args, &config, json).await,
        Commands::Tree => commands::tree::execute(&config, json).await,
        Commands::Project(args) => commands::project::execute(args, &config, json).await,
        Commands::Subproject(args) => commands::subproject::execute(args, &config, json).await,
        Commands::Task(args) => commands::task::execute(args, &config, json).await,
        Commands::Settings(args) => commands::settings::execute(args, &config, json).await,
        Commands::Usage(args) => commands::usage::execute(args, &config, json).await,
    };

    if let Err(err) = result {
        foreman::cli::handle_error(err, json);
    }
}

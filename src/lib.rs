pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod guard;
pub mod ladder;
pub mod recorder;
pub mod registry;
pub mod services;
pub mod stats;
pub mod storage;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use cli::Cli;

use crate::cli::Command;
use crate::config::settings::AppConfig;
use crate::services::{ConsoleService, Ladder};

pub use errors::{LadderError, Result as LadderResult};

pub fn interpret() -> Cli {
    Cli::parse()
}

/// Environment configuration with command-line overrides applied
pub fn build_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(backend) = &cli.backend {
        config.storage.backend = backend.parse()?;
    }
    if let Some(data) = &cli.data {
        config.storage.path = data.clone();
    }
    if let Some(catalog) = &cli.catalog {
        config.stats.characters_path = Some(catalog.clone());
    }
    Ok(config)
}

pub fn handle_completions(shell: Shell) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
    Ok(())
}

pub fn handle_ladder_command(config: &AppConfig, command: &Command) -> Result<()> {
    let ladder = Ladder::from_config(config)?;
    let service = ConsoleService::new(ladder);
    service.run(command)
}

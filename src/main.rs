use anyhow::Result;

use smash_ladder::cli::{Cli, Command};
use smash_ladder::{build_config, handle_completions, handle_ladder_command, interpret};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let cli = interpret();
    execute_command(&cli)
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Completions { shell } => handle_completions(*shell),
        command => {
            let config = build_config(cli)?;
            handle_ladder_command(&config, command)
        }
    }
}

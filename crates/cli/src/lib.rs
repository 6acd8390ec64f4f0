pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod output;
pub mod shell;

use std::io::{self, BufReader};

use anyhow::{Context, Result};

pub use config::AppConfig;
pub use teamdesk_core as core;

use crate::cli::{Cli, CliCommand};
use crate::commands::Runner;
use crate::output::Format;

/// Run a parsed command line to completion on an internal Tokio runtime.
pub fn run(cli: Cli) -> Result<()> {
    logging::init(cli.log_filter.clone())?;
    let config = config::from_cli(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(dispatch(cli, config))
}

async fn dispatch(cli: Cli, config: AppConfig) -> Result<()> {
    let mut runner = Runner::connect(&config, cli.demo)?;
    let format = Format::from_flag(cli.json);
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match cli.command {
        None | Some(CliCommand::Shell) => {
            // Unlocked reader: password prompts read stdin too.
            let input = BufReader::new(io::stdin());
            shell::run(&mut runner, input, &mut handle, format).await
        }
        Some(command) => {
            let result = runner.execute(command, format, &mut handle).await;
            runner.close();
            result
        }
    }
}

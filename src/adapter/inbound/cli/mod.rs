//! Operator command-line interface.

pub mod command;
pub mod control;
pub mod output;
pub mod server;

use command::{Cli, Commands};

use crate::error::Result;

/// Run the parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet));
    match cli.command {
        Commands::Server(args) => server::execute(&args).await,
        Commands::Control(args) => {
            crate::infrastructure::config::LoggingConfig {
                level: "warn".to_string(),
                format: "pretty".to_string(),
            }
            .init();
            control::execute(args).await
        }
    }
}

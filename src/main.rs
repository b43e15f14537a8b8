use anyhow::Result;
use clap::Parser;

use codeforge::cli::{Cli, Command};
use codeforge::config::Config;
use codeforge::{commands, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from(cli.config.as_deref())?;
    if let Some(url) = cli.service_url {
        config.service_url = url;
    }
    logging::init(&config.log_level, cli.verbose);

    match cli.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.listen = listen;
            }
            commands::serve(&config).await
        }
        Command::Generate {
            task,
            framework,
            out,
        } => commands::generate(&config, &task, &framework, out.as_deref()).await,
        Command::Status { id } => commands::status(&config, &id).await,
        Command::Result { id, out } => commands::result(&config, &id, out.as_deref()).await,
        Command::List => commands::list(&config).await,
    }
}

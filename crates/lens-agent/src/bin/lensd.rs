//! Main binary for the gpulens agent daemon (lensd)

use clap::{Parser, Subcommand};
use lens_agent::{init_agent, AgentConfig, Result};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "lensd")]
#[command(about = "Post-job GPU efficiency analysis agent for gpulens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Data directory override
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent (default)
    Start,
    /// Print the default configuration as YAML
    Config,
    /// Validate a configuration file
    Check {
        /// Configuration file to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("lensd failed: {}", e);
        eprintln!("lensd failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Config) => {
            print!("{}", AgentConfig::default().to_yaml()?);
            Ok(())
        }
        Some(Commands::Check { file }) => {
            let config = AgentConfig::load(&file)?;
            println!("configuration ok: agent {}", config.agent.name);
            Ok(())
        }
        Some(Commands::Start) | None => {
            let mut config = match cli.config {
                Some(path) => AgentConfig::load(&path)?,
                None => AgentConfig::default(),
            };

            if let Some(level) = cli.log_level {
                config.logging.level = level;
            }
            if let Some(data_dir) = cli.data_dir {
                config.agent.data_dir = data_dir;
            }

            let mut agent = init_agent(&config).await?;
            agent.run().await
        }
    }
}

//! RobotCLI binary entry point.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use robotcli::cli;
use robotcli::config::Config;

#[derive(Parser)]
#[command(name = "robotcli", version, about = "RobotCLI: your system AI agent")]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat session
    Start {
        /// Initial model to use
        #[arg(long)]
        model: Option<String>,
    },
    /// List the selectable models
    Models,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format);

    let config = Config::load()?;

    match args.command.unwrap_or(Commands::Start { model: None }) {
        Commands::Start { model } => cli::interactive_session(config, model).await,
        Commands::Models => {
            cli::list_models(&config);
            Ok(())
        }
    }
}

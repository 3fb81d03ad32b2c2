//! resynth CLI - pitch-tracking resynthesis from the command line.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resynth")]
#[command(author, version, about = "Pitch-tracking resynthesis effect", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the effect in real time on an audio device
    Run(commands::run::RunArgs),

    /// Stream a WAV file through the effect offline and capture the result
    Render(commands::render::RenderArgs),

    /// Display WAV file information
    Info(commands::info::InfoArgs),

    /// List audio devices
    Devices(commands::devices::DevicesArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Devices(args) => commands::devices::run(args),
    }
}

mod check;
mod replay;

use anyhow::Result;
use check::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "viewsync")]
#[command(version, about = "Drive a view tree bridge against a recording renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script of bridge calls and print one reply per line
    Replay {
        /// JSON array of calls, or one call per line
        script: PathBuf,
        /// Bridge config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Overrides the config's log level
        #[arg(long)]
        log_level: Option<String>,
        /// Print the renderer calls to stderr after the replies
        #[arg(long)]
        show_calls: bool,
        /// Exit with status 1 if any call failed
        #[arg(long)]
        strict: bool,
    },
    /// Validate a hierarchy payload without applying it
    Check {
        /// Nested or flat hierarchy (JSON)
        file: PathBuf,
        /// Expected root id. Defaults to the payload's own root
        #[arg(short, long)]
        root: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            script,
            config,
            log_level,
            show_calls,
            strict,
        } => {
            let summary = replay::run_replay(replay::ReplayOptions {
                script,
                config,
                log_level,
                show_calls,
            })?;
            if strict && summary.failed > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Check { file, root, format } => {
            check::run_check(check::CheckOptions { file, root, format })
        }
    }
}

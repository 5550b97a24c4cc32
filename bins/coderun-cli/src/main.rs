mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coderun-cli")]
#[command(about = "coderun CLI - Run source files through the local toolchains", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile (when needed) and run a source file in a throwaway workspace
    Run {
        /// Language identifier (python, javascript, c, cpp, java)
        #[arg(short, long)]
        lang: String,

        /// Source file to run
        file: PathBuf,

        /// File fed to the program's stdin ("-" reads this process's stdin)
        #[arg(short, long)]
        stdin: Option<PathBuf>,

        /// Wall-clock limit for the run step in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported languages
    ListLangs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so program output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            lang,
            file,
            stdin,
            timeout_ms,
            json,
        } => {
            let code = commands::run_file(&lang, &file, stdin.as_deref(), timeout_ms, json).await?;
            std::process::exit(code);
        }
        Commands::ListLangs => {
            commands::list_languages();
        }
    }

    Ok(())
}

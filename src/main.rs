use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "gradebox")]
#[command(
    author,
    version,
    about = "Sandboxed code execution and grading for untrusted submissions"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a source file in an isolated sandbox
    Run {
        /// Language of the submission (python or javascript)
        #[arg(short, long)]
        language: String,

        /// Path to the source file
        file: PathBuf,

        /// Expected output fragment; repeat for multiple test cases
        #[arg(short = 't', long = "test-case")]
        test_cases: Vec<String>,

        /// Override the execution timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Append the graded submission to a JSONL ledger file
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// List supported languages and their runtimes
    Languages,

    /// Pull the runtime images used by the language adapters
    Pull {
        /// Only pull the image for this language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Remove orphaned sandbox containers
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("gradebox=debug")
    } else {
        EnvFilter::new("gradebox=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            language,
            file,
            test_cases,
            timeout,
            ledger,
        } => {
            commands::run::run(language, file, test_cases, timeout, ledger).await?;
        }
        Commands::Languages => {
            commands::languages::run()?;
        }
        Commands::Pull { language } => {
            commands::pull::run(language).await?;
        }
        Commands::Clean => {
            commands::clean::run().await?;
        }
    }

    Ok(())
}

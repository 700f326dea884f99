//! studydiag CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

use commands::trend::TrendFormat;
use commands::Paths;

#[derive(Parser)]
#[command(
    name = "studydiag",
    version,
    about = "AI study diagnostician: quoted feedback, elite scores, and progress across test attempts"
)]
struct Cli {
    /// Directory holding study-results.json (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter studydiag.toml
    Init,

    /// Create a new test to track attempts against
    NewTest {
        /// Test name (e.g. "Algebra midterm")
        #[arg(long)]
        name: String,

        /// Subject: Math, Science, Accounting, Programming, or any other name
        #[arg(long)]
        subject: Option<String>,
    },

    /// List tests
    Tests,

    /// Generate feedback for an attempt and add it to a test
    Analyze {
        /// Test id, id prefix, or name
        #[arg(long)]
        test: String,

        /// The student's answers (PDF, .txt or .md)
        #[arg(long)]
        attempt_file: PathBuf,

        /// The test paper, used as extra context
        #[arg(long)]
        questions_file: Option<PathBuf>,
    },

    /// Show feedback for an attempt (latest by default)
    Show {
        /// Test id, id prefix, or name
        #[arg(long)]
        test: String,

        /// Attempt number, starting at 1
        #[arg(long)]
        attempt: Option<usize>,
    },

    /// Show the score history with its moving-average trend
    Trend {
        /// Test id, id prefix, or name
        #[arg(long)]
        test: String,

        /// Moving-average window (defaults to the configured trend_window)
        #[arg(long)]
        window: Option<usize>,

        /// Output format: text, json
        #[arg(long, value_enum, default_value = "text")]
        format: TrendFormat,
    },

    /// Delete an attempt; later attempts are renumbered
    DeleteAttempt {
        /// Test id, id prefix, or name
        #[arg(long)]
        test: String,

        /// Attempt number, starting at 1
        #[arg(long)]
        attempt: usize,
    },

    /// List attempts across all tests for one subject
    Subject {
        #[arg(long)]
        subject: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("studydiag=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let paths = Paths {
        config: cli.config,
        data_dir: cli.data_dir,
    };

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::NewTest { name, subject } => commands::new_test::execute(&paths, name, subject),
        Commands::Tests => commands::tests::execute(&paths),
        Commands::Analyze {
            test,
            attempt_file,
            questions_file,
        } => commands::analyze::execute(&paths, test, attempt_file, questions_file).await,
        Commands::Show { test, attempt } => commands::show::execute(&paths, test, attempt),
        Commands::Trend {
            test,
            window,
            format,
        } => commands::trend::execute(&paths, test, window, format),
        Commands::DeleteAttempt { test, attempt } => {
            commands::delete_attempt::execute(&paths, test, attempt)
        }
        Commands::Subject { subject } => commands::subject::execute(&paths, subject),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

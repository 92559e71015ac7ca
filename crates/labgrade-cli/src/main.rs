//! labgrade CLI: the instructor-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "labgrade",
    version,
    about = "Quiz activity monitoring and grading for lab sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check declared run parameters against the reference
    Monitor {
        /// Event log file (overrides the configured source)
        #[arg(long)]
        events: Option<PathBuf>,

        /// Quiz definition TOML (default: quiz_file from config)
        #[arg(long)]
        quiz: Option<PathBuf>,

        /// Reference parameters, e.g. "{'retries': 2, 'exam_mode': True}"
        #[arg(long)]
        parameters: Option<String>,

        /// Reference keys to skip (comma-separated)
        #[arg(long)]
        ignore: Option<String>,

        /// One row per student instead of one row per mismatch
        #[arg(long)]
        group: bool,

        /// Hide students with nothing to report
        #[arg(long)]
        only_anomalies: bool,

        /// Also compare the composite reference hash
        #[arg(long)]
        full_hash: bool,

        /// Re-pull the log periodically until interrupted
        #[arg(long)]
        watch: bool,

        /// Minutes between pulls in watch mode (default: from config)
        #[arg(long)]
        refresh: Option<u64>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Summarize quiz activity per class and per student
    Activity {
        /// Event log file (overrides the configured source)
        #[arg(long)]
        events: Option<PathBuf>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score the log and publish final marks
    Grade {
        /// Event log file (overrides the configured source)
        #[arg(long)]
        events: Option<PathBuf>,

        /// Quiz definition TOML (default: quiz_file from config)
        #[arg(long)]
        quiz: Option<PathBuf>,

        /// Question coefficients, e.g. "{'q1': 2, 'q3': 0.5}"
        #[arg(long)]
        coefficients: Option<String>,

        /// Outcome weights, e.g. "{'TT': 1, 'TF': -1, 'FT': 0, 'FF': 0}"
        #[arg(long)]
        weights: Option<String>,

        /// Grade a randomized exam with this title
        #[arg(long)]
        exam_title: Option<String>,

        /// Floor for final marks
        #[arg(long)]
        threshold: Option<f64>,

        /// Submissions counted per quiz
        #[arg(long)]
        max_tries: Option<u32>,

        /// Output directory (default: output_dir from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: table, json, html, all
        #[arg(long, default_value = "table")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Recompute final marks from a saved raw score table
    Regrade {
        /// Raw score table JSON written by `grade --format json`
        #[arg(long)]
        raw: PathBuf,

        /// Question coefficients, e.g. "{'q1': 2, 'q3': 0.5}"
        #[arg(long)]
        coefficients: Option<String>,

        /// Floor for final marks (default: from config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Write the final table to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate quiz definition TOML files
    Validate {
        /// Path to a quiz file or directory
        #[arg(long)]
        quiz: PathBuf,
    },

    /// Create starter config and example quiz definition
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("labgrade=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Monitor {
            events,
            quiz,
            parameters,
            ignore,
            group,
            only_anomalies,
            full_hash,
            watch,
            refresh,
            format,
            config,
        } => {
            let options = commands::monitor::MonitorOptions {
                parameters,
                ignore,
                group,
                only_anomalies,
                full_hash,
                watch,
                refresh,
                format,
            };
            commands::monitor::execute(events, quiz, options, config).await
        }
        Commands::Activity {
            events,
            format,
            config,
        } => commands::activity::execute(events, format, config).await,
        Commands::Grade {
            events,
            quiz,
            coefficients,
            weights,
            exam_title,
            threshold,
            max_tries,
            output,
            format,
            config,
        } => {
            commands::grade::execute(
                events,
                quiz,
                coefficients,
                weights,
                exam_title,
                threshold,
                max_tries,
                output,
                format,
                config,
            )
            .await
        }
        Commands::Regrade {
            raw,
            coefficients,
            threshold,
            output,
            config,
        } => commands::regrade::execute(raw, coefficients, threshold, output, config),
        Commands::Validate { quiz } => commands::validate::execute(quiz),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

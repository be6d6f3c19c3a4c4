//! CLI definition using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wiseplate_types::{OutputFormat, StatisticsSourceKind};

#[derive(Parser)]
#[command(name = "wiseplate")]
#[command(version)]
#[command(about = "Cafeteria food-waste auditing from tray photos")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Models directory. Uses config value if not specified.
    #[arg(long, global = true)]
    pub models_dir: Option<PathBuf>,

    /// Record store directory. Uses config value if not specified.
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Output format (json, table). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze every tray image in a directory
    Run {
        /// Directory of tray images. Uses config value if not specified.
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Output tree root (reset on every run). Uses config value if not specified.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Analysis date (YYYY-MM-DD). Defaults to today.
        #[arg(long, short = 'd')]
        date: Option<String>,

        /// User the records belong to
        #[arg(long, short = 'u')]
        user: String,

        /// Remove the input directory after the run
        #[arg(long)]
        remove_input: bool,
    },

    /// Print the waste statistics report
    Stats {
        /// Statistics source. Uses config value if not specified.
        #[arg(long, short = 's')]
        source: Option<StatisticsSourceKind>,

        /// Output tree root (tree source). Uses config value if not specified.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Only this user's records (store source)
        #[arg(long, short = 'u')]
        user: Option<String>,

        /// Only this analysis date, YYYY-MM-DD (store source)
        #[arg(long, short = 'd')]
        date: Option<String>,
    },

    /// List a user's analysis records, newest analysis date first
    Results {
        /// User whose records to list
        #[arg(long, short = 'u')]
        user: String,

        /// Limit number of records shown
        #[arg(long, short = 'n', default_value = "50")]
        limit: usize,
    },

    /// Show the model manifest and which models load
    Models,

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set a value (e.g. detection.confidence_threshold=0.3)
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,
    },
}

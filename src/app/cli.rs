//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trackpad Glyphs - Draw symbols on the trackpad and have them recognized
#[derive(Parser, Debug)]
#[command(name = "glyphs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration and data directories
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Record labeled training drawings
    Collect {
        /// Label for every drawing in this session
        label: String,

        /// Number of drawings to record
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// Train a model on every stored drawing
    Train {
        /// Model type: knn, rf, dtw (config default when omitted)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Draw symbols one at a time and print predictions
    Predict {
        /// Model type: knn, rf, dtw
        #[arg(short, long)]
        model: Option<String>,

        /// Ask whether each prediction was right and learn from the answer
        #[arg(short, long)]
        feedback: bool,
    },

    /// Recognize continuously, splitting symbols on pauses
    Listen {
        /// Model type: knn, rf, dtw
        #[arg(short, long)]
        model: Option<String>,

        /// Pause that ends a symbol, in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Show example counts per label
    Stats,

    /// Delete every drawing for a label
    Delete {
        /// Label to delete
        label: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Export all drawings as JSON
    Export {
        /// Output file
        file: PathBuf,
    },

    /// Import drawings from a JSON export and retrain
    Import {
        /// Input file
        file: PathBuf,

        /// Model type to retrain
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Delete a trained model
    Reset {
        /// Model type: knn, rf, dtw
        #[arg(short, long)]
        model: Option<String>,

        /// Also delete every stored drawing
        #[arg(long)]
        all: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "classifier.model")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "auto_mode.pause_threshold_ms")
        key: String,

        /// Value to set
        value: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

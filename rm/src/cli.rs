//! CLI argument parsing for repomap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::format::FormatStyle;

#[derive(Parser, Debug)]
#[command(name = "repomap")]
#[command(author, version, about = "Repository symbol and dependency analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate and print a repo map
    Map {
        /// Project root to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Projection style: compact, detailed, tree
        #[arg(short, long, default_value = "compact")]
        style: FormatStyle,

        /// Token budget for the projection
        #[arg(short = 't', long, default_value = "4000")]
        max_tokens: usize,

        /// Maximum number of files to analyze
        #[arg(long, default_value = "500")]
        max_files: usize,

        /// Glob patterns to exclude
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Print analysis statistics for a project
    Stats {
        /// Project root to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum number of files to analyze
        #[arg(long, default_value = "500")]
        max_files: usize,

        /// Emit machine-readable JSON instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// List dependency cycles in a project
    Cycles {
        /// Project root to analyze
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

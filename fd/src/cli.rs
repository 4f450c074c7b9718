//! CLI argument parsing for forgedaemon

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fd")]
#[command(author, version, about = "Autonomous multi-agent code-generation orchestrator", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dispatch a task through the full QA loop
    Run {
        /// Natural-language task description
        #[arg(required = true)]
        description: String,

        /// Short task name (defaults to the first words of the description)
        #[arg(short, long)]
        name: Option<String>,

        /// Files the task may touch
        #[arg(short, long)]
        file: Vec<String>,

        /// Working directory override
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Run the gate pipeline once, without agents or repair
    Gates {
        /// Working directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Print a token-bounded repo map for a project
    Map {
        /// Project root to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Token budget for the projection
        #[arg(short = 't', long, default_value = "4000")]
        max_tokens: usize,
    },
}

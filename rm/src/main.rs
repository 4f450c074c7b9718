use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use repomap::cli::{Cli, Command};
use repomap::{DependencyGraph, FormatOptions, GeneratorOptions, RepoFormatter, RepoMapGenerator};

fn setup_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    match cli.command {
        Command::Map {
            path,
            style,
            max_tokens,
            max_files,
            exclude,
        } => {
            let generator = RepoMapGenerator::new(GeneratorOptions {
                max_files,
                exclude_patterns: exclude,
                ..Default::default()
            });
            let map = generator.generate(&path).context("Failed to generate repo map")?;
            info!(files = map.stats.total_files, "Map generated");

            let formatter = RepoFormatter::new(FormatOptions {
                style,
                max_tokens,
                ..Default::default()
            });
            print!("{}", formatter.format(&map));
        }
        Command::Stats { path, max_files, json } => {
            let generator = RepoMapGenerator::new(GeneratorOptions {
                max_files,
                ..Default::default()
            });
            let map = generator.generate(&path).context("Failed to generate repo map")?;
            let stats = &map.stats;

            if json {
                println!("{}", serde_json::to_string_pretty(stats)?);
                return Ok(());
            }

            println!("Project: {}", map.project_root.cyan());
            println!("  Files: {}", stats.total_files);
            println!("  Symbols: {}", stats.total_symbols);
            println!("  Edges: {}", stats.total_edges);
            println!("  Failed parses: {}", stats.failed_files);
            println!("  Generated in: {}ms", stats.generation_time_ms);

            if !stats.most_referenced.is_empty() {
                println!("  Most referenced:");
                for (id, refs) in &stats.most_referenced {
                    println!("    {} {}", format!("({})", refs).dimmed(), id);
                }
            }
            if !stats.most_connected.is_empty() {
                println!("  Most connected:");
                for (file, degree) in &stats.most_connected {
                    println!("    {} {}", format!("({})", degree).dimmed(), file.yellow());
                }
            }
        }
        Command::Cycles { path } => {
            let generator = RepoMapGenerator::default();
            let map = generator.generate(&path).context("Failed to generate repo map")?;
            let files = map.files.iter().map(|f| f.path.clone()).collect();
            let graph = DependencyGraph::from_edges(map.edges, files);

            let cycles = graph.find_cycles();
            if cycles.is_empty() {
                println!("{} No dependency cycles", "✓".green());
            } else {
                for cycle in cycles {
                    println!("{} {}", "cycle:".red(), cycle.join(" -> "));
                }
            }
        }
    }

    Ok(())
}

//! Forgedaemon - autonomous multi-agent code-generation orchestrator
//!
//! CLI entry point for dispatching tasks and inspecting projects.

use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use forgedaemon::cli::{Cli, Command};
use forgedaemon::config::Config;
use forgedaemon::coordinator::Coordinator;
use forgedaemon::domain::Task;
use forgedaemon::gates::{BuildRunner, LintRunner, TestRunner};
use forgedaemon::llm::AnthropicClient;

fn setup_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    info!("Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            description,
            name,
            file,
            dir,
        } => {
            if let Some(dir) = dir {
                config.working_dir = Some(dir);
            }
            let llm = Arc::new(AnthropicClient::from_config(&config.llm).context("Failed to create LLM client")?);

            let name = name.unwrap_or_else(|| {
                description.split_whitespace().take(5).collect::<Vec<_>>().join(" ")
            });
            let task = Task::new(name, description).with_target_files(file);

            info!(
                "Dispatching task {} (model: {}, max iterations: {})",
                task.id, config.llm.model, config.qa.max_iterations
            );

            let coordinator = Coordinator::new(config, llm);
            let handle = coordinator.handle();
            let actor = tokio::spawn(coordinator.run());

            let result = handle.submit(task).await?;
            handle.shutdown().await?;
            let _ = actor.await;

            if result.success {
                println!("{} converged after {} iterations", "✓".green(), result.iterations);
            } else {
                println!(
                    "{} {} after {} iterations",
                    "✗".red(),
                    if result.escalated { "escalated" } else { "failed" },
                    result.iterations
                );
                if let Some(reason) = &result.reason {
                    println!("  reason: {}", reason);
                }
                if let Some(build) = &result.last_build {
                    for error in &build.errors {
                        println!("  {}", error.render().red());
                    }
                }
                std::process::exit(1);
            }
        }
        Command::Gates { dir } => {
            let mut build = BuildRunner::from_config(&config.gates.build);
            let mut lint = LintRunner::from_config(&config.gates.lint);
            let mut test = TestRunner::from_config(&config.gates.test);
            build.set_iteration(1);
            lint.set_iteration(1);
            test.set_iteration(1);

            let build_result = build.run(&dir).await;
            print_gate("build", build_result.success, build_result.errors.len());
            let lint_result = lint.run(&dir).await;
            print_gate("lint", lint_result.success, lint_result.errors.len());
            let test_result = test.run(&dir).await;
            print_gate("test", test_result.success, test_result.errors.len());

            for entry in build_result
                .errors
                .iter()
                .chain(lint_result.errors.iter())
                .chain(test_result.errors.iter())
            {
                println!("  {}", entry.render());
            }

            if !(build_result.success && lint_result.success && test_result.success) {
                std::process::exit(1);
            }
        }
        Command::Map { path, max_tokens } => {
            let generator = repomap::RepoMapGenerator::new(repomap::GeneratorOptions {
                max_files: config.analysis.max_files,
                include_patterns: config.analysis.include_patterns.clone(),
                exclude_patterns: config.analysis.exclude_patterns.clone(),
                ..Default::default()
            });
            let map = generator.generate(&path).context("Failed to generate repo map")?;
            let formatter = repomap::RepoFormatter::new(repomap::FormatOptions {
                max_tokens,
                ..Default::default()
            });
            print!("{}", formatter.format(&map));
        }
    }

    Ok(())
}

fn print_gate(gate: &str, success: bool, errors: usize) {
    if success {
        println!("{} {}", "✓".green(), gate);
    } else {
        println!("{} {} ({} errors)", "✗".red(), gate, errors);
    }
}

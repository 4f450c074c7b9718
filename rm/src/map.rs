//! Repo map generation
//!
//! Walks a project tree, parses every source file, builds the dependency
//! graph, counts references, and aggregates the result plus summary
//! statistics into a [`RepoMap`].

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::graph::{DependencyEdge, DependencyGraph, normalize_path};
use crate::language::{Language, detect_language};
use crate::parser::{ParseResult, Parser, ParserOptions};
use crate::references::{RankedSymbol, ReferenceCounter};
use crate::symbol::Symbol;

/// Directories never worth walking into.
const SKIP_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "coverage", ".next", "out"];

/// Options for the analysis pipeline
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Hard cap on files analyzed
    pub max_files: usize,

    /// Glob patterns a file must match (empty = all source files)
    pub include_patterns: Vec<String>,

    /// Glob patterns that exclude a file
    pub exclude_patterns: Vec<String>,

    /// Attach doc comments during parsing
    pub extract_docs: bool,

    /// Run the reference counter after parsing
    pub count_references: bool,

    /// Import alias prefixes (`"@/"` -> `"src/"`)
    pub aliases: HashMap<String, String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_files: 500,
            include_patterns: vec![],
            exclude_patterns: vec![],
            extract_docs: true,
            count_references: true,
            aliases: HashMap::new(),
        }
    }
}

/// Per-file metadata in the map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Root-relative normalized path
    pub path: String,
    pub language: Language,
    pub lines: usize,
    pub symbol_count: usize,
    pub import_count: usize,
    pub export_count: usize,
    pub parse_success: bool,
}

/// Aggregated statistics over a map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoStats {
    pub total_files: usize,
    pub total_symbols: usize,
    pub total_edges: usize,
    pub failed_files: usize,

    /// Symbol counts keyed by kind name
    pub symbols_by_kind: HashMap<String, usize>,

    /// `(symbol id, references)` for the top referenced symbols
    pub most_referenced: Vec<(String, u32)>,

    /// `(file, degree)` for the most connected files
    pub most_connected: Vec<(String, usize)>,

    pub generation_time_ms: u64,
}

/// Aggregation root for one analyzed repository
#[derive(Debug, Clone)]
pub struct RepoMap {
    /// Absolute project root the map was generated from
    pub project_root: String,

    pub generated_at: DateTime<Utc>,

    pub files: Vec<FileMetadata>,
    pub symbols: Vec<Symbol>,
    pub edges: Vec<DependencyEdge>,
    pub stats: RepoStats,

    /// Symbols ranked by combined reference/importance score
    pub ranked: Vec<RankedSymbol>,
}

impl RepoMap {
    /// Total inbound references across the symbols of one file.
    pub fn file_references(&self, path: &str) -> u32 {
        self.symbols.iter().filter(|s| s.file == path).map(|s| s.references).sum()
    }
}

/// Runs the full analysis pipeline over a project directory
#[derive(Debug, Clone, Default)]
pub struct RepoMapGenerator {
    options: GeneratorOptions,
}

impl RepoMapGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    /// Generate a map for the project rooted at `root`.
    pub fn generate(&self, root: impl AsRef<Path>) -> Result<RepoMap> {
        let root = root.as_ref();
        let start = Instant::now();
        debug!(root = %root.display(), "RepoMapGenerator::generate: called");

        let paths = self.collect_files(root)?;
        debug!(count = paths.len(), "RepoMapGenerator::generate: collected files");

        let mut sources = Vec::with_capacity(paths.len());
        for rel in &paths {
            match std::fs::read_to_string(root.join(rel)) {
                Ok(content) => sources.push((rel.clone(), content)),
                Err(e) => warn!(file = %rel, error = %e, "Skipping unreadable file"),
            }
        }

        let parser = Parser::new(ParserOptions {
            extract_docs: self.options.extract_docs,
        });
        let results = parser.parse_files(&sources);

        let graph = DependencyGraph::build(&results, &self.options.aliases);

        let mut symbols: Vec<Symbol> = results.iter().flat_map(|r| r.symbols.clone()).collect();
        let counter = ReferenceCounter::new();
        let ranked = if self.options.count_references {
            counter.count(&mut symbols, &results);
            let indegree: HashMap<String, usize> =
                graph.files().iter().map(|f| (f.clone(), graph.indegree(f))).collect();
            let importance = counter.importance_scores(&symbols, &results, &indegree);
            counter.ranked_symbols(&symbols, &importance)
        } else {
            vec![]
        };

        let files = file_metadata(&sources, &results);
        let stats = compute_stats(&files, &symbols, &graph, start.elapsed().as_millis() as u64);

        info!(
            root = %root.display(),
            files = files.len(),
            symbols = symbols.len(),
            edges = graph.edges().len(),
            elapsed_ms = stats.generation_time_ms,
            "Repo map generated"
        );

        Ok(RepoMap {
            project_root: root.display().to_string(),
            generated_at: Utc::now(),
            files,
            symbols,
            edges: graph.edges().to_vec(),
            stats,
            ranked,
        })
    }

    /// Walk the tree and return root-relative normalized source paths,
    /// sorted for determinism, capped at `max_files`.
    fn collect_files(&self, root: &Path) -> Result<Vec<String>> {
        let include: Vec<glob::Pattern> = compile_patterns(&self.options.include_patterns)?;
        let exclude: Vec<glob::Pattern> = compile_patterns(&self.options.exclude_patterns)?;

        let mut paths = Vec::new();
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()))
        });

        for entry in walker {
            let entry = entry.context("Failed to walk project directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            if detect_language(entry.path()).is_none() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let rel = normalize_path(&rel);

            if !include.is_empty() && !include.iter().any(|p| p.matches(&rel)) {
                continue;
            }
            if exclude.iter().any(|p| p.matches(&rel)) {
                continue;
            }
            paths.push(rel);
        }

        paths.sort();
        if paths.len() > self.options.max_files {
            warn!(
                found = paths.len(),
                cap = self.options.max_files,
                "File cap exceeded; analyzing the first files in path order"
            );
            paths.truncate(self.options.max_files);
        }
        Ok(paths)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).context(format!("Invalid glob pattern: {}", p)))
        .collect()
}

fn file_metadata(sources: &[(String, String)], results: &[ParseResult]) -> Vec<FileMetadata> {
    sources
        .iter()
        .zip(results)
        .map(|((path, content), result)| FileMetadata {
            path: result.file.clone(),
            language: detect_language(path).unwrap_or(Language::JavaScript),
            lines: content.lines().count(),
            symbol_count: result.symbols.len(),
            import_count: result.imports.len(),
            export_count: result.exports.len(),
            parse_success: result.success,
        })
        .collect()
}

fn compute_stats(files: &[FileMetadata], symbols: &[Symbol], graph: &DependencyGraph, elapsed_ms: u64) -> RepoStats {
    let mut symbols_by_kind: HashMap<String, usize> = HashMap::new();
    for symbol in symbols {
        *symbols_by_kind.entry(symbol.kind.to_string()).or_default() += 1;
    }

    let mut most_referenced: Vec<(String, u32)> = symbols
        .iter()
        .filter(|s| s.references > 0)
        .map(|s| (s.id.clone(), s.references))
        .collect();
    most_referenced.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    most_referenced.truncate(10);

    let mut most_connected = graph.sort_by_connections();
    most_connected.retain(|(_, degree)| *degree > 0);
    most_connected.truncate(10);

    RepoStats {
        total_files: files.len(),
        total_symbols: symbols.len(),
        total_edges: graph.edges().len(),
        failed_files: files.iter().filter(|f| !f.parse_success).count(),
        symbols_by_kind,
        most_referenced,
        most_connected,
        generation_time_ms: elapsed_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_generate_small_project() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/user.ts", "export class User {\n}\n");
        write(temp.path(), "src/a.ts", "import { User } from './user';\n");
        write(temp.path(), "src/b.ts", "import { User } from './user';\n");

        let map = RepoMapGenerator::default().generate(temp.path()).unwrap();

        assert_eq!(map.stats.total_files, 3);
        assert_eq!(map.stats.total_edges, 2);
        let user = map.symbols.iter().find(|s| s.name == "User").unwrap();
        assert_eq!(user.references, 2);
        assert_eq!(map.stats.most_referenced[0].0, user.id);
        assert!(map.stats.most_connected[0].0.ends_with("user.ts"));
    }

    #[test]
    fn test_skip_dirs_and_unsupported() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/a.ts", "export const a = 1;\n");
        write(temp.path(), "node_modules/pkg/index.ts", "export const n = 1;\n");
        write(temp.path(), "src/styles.css", "body {}\n");

        let map = RepoMapGenerator::default().generate(temp.path()).unwrap();
        assert_eq!(map.stats.total_files, 1);
        assert_eq!(map.files[0].path, "src/a.ts");
    }

    #[test]
    fn test_max_files_cap() {
        let temp = tempdir().unwrap();
        for i in 0..5 {
            write(temp.path(), &format!("src/f{}.ts", i), "export const x = 1;\n");
        }
        let generator = RepoMapGenerator::new(GeneratorOptions {
            max_files: 3,
            ..Default::default()
        });
        let map = generator.generate(temp.path()).unwrap();
        assert_eq!(map.stats.total_files, 3);
    }

    #[test]
    fn test_exclude_patterns() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/a.ts", "export const a = 1;\n");
        write(temp.path(), "src/a.test.ts", "import { a } from './a';\n");

        let generator = RepoMapGenerator::new(GeneratorOptions {
            exclude_patterns: vec!["**/*.test.ts".to_string()],
            ..Default::default()
        });
        let map = generator.generate(temp.path()).unwrap();
        assert_eq!(map.stats.total_files, 1);
    }

    #[test]
    fn test_count_references_disabled() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/user.ts", "export class User {\n}\n");
        write(temp.path(), "src/a.ts", "import { User } from './user';\n");

        let generator = RepoMapGenerator::new(GeneratorOptions {
            count_references: false,
            ..Default::default()
        });
        let map = generator.generate(temp.path()).unwrap();
        assert!(map.ranked.is_empty());
        assert!(map.symbols.iter().all(|s| s.references == 0));
    }

    #[test]
    fn test_failed_files_tracked() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/bad.ts", "class Broken {\n");
        let map = RepoMapGenerator::default().generate(temp.path()).unwrap();
        assert_eq!(map.stats.failed_files, 1);
    }
}

//! Context component assembly
//!
//! Each builder operation produces one bounded component of a task context.
//! Operations are independently fallible: any internal failure degrades to
//! an empty or stub component so context assembly as a whole never fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use repomap::{FormatOptions, GeneratorOptions, RepoFormatter, RepoMap, RepoMapGenerator, estimate_tokens};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::budget::prefix_fit;
use super::memory::{CodeHit, CodeMemory, CodeSearchOptions, MemoryBackend, MemoryHit, MemorySearchOptions};
use crate::config::{AnalysisConfig, ContextConfig};
use crate::domain::Task;

/// How long a cached repo map stays fresh.
const REPO_MAP_TTL: Duration = Duration::from_secs(300);

/// Caps on the codebase-docs component.
const MAX_PATTERNS: usize = 5;
const MAX_APIS: usize = 10;

/// Why a file was included in context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRelevance {
    TaskFile,
    Requested,
    TypeDefinition,
    Test,
    Related,
    Dependency,
}

impl FileRelevance {
    /// Fixed relevance score table.
    pub fn score(&self) -> f64 {
        match self {
            FileRelevance::TaskFile => 1.0,
            FileRelevance::Requested => 0.8,
            FileRelevance::TypeDefinition => 0.7,
            FileRelevance::Test => 0.6,
            FileRelevance::Related => 0.5,
            FileRelevance::Dependency => 0.4,
        }
    }
}

/// One file admitted into context
#[derive(Debug, Clone)]
pub struct FileContextEntry {
    pub path: String,
    pub content: String,
    pub relevance: FileRelevance,
    pub score: f64,
    pub tokens: usize,
}

struct CachedMap {
    map: RepoMap,
    created: Instant,
}

/// Assembles the bounded components of a task context
pub struct ContextBuilder {
    project_root: PathBuf,
    context_config: ContextConfig,
    analysis_config: AnalysisConfig,
    code_memory: Option<std::sync::Arc<dyn CodeMemory>>,
    memory: Option<std::sync::Arc<dyn MemoryBackend>>,

    /// Repo maps keyed by project path. The lock is held across a miss so
    /// concurrent misses for the same key collapse to one computation.
    repo_map_cache: Mutex<HashMap<PathBuf, CachedMap>>,
}

impl ContextBuilder {
    pub fn new(project_root: impl Into<PathBuf>, context_config: ContextConfig, analysis_config: AnalysisConfig) -> Self {
        Self {
            project_root: project_root.into(),
            context_config,
            analysis_config,
            code_memory: None,
            memory: None,
            repo_map_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_code_memory(mut self, code_memory: std::sync::Arc<dyn CodeMemory>) -> Self {
        self.code_memory = Some(code_memory);
        self
    }

    pub fn with_memory(mut self, memory: std::sync::Arc<dyn MemoryBackend>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Formatted repo map bounded by `max_tokens`.
    ///
    /// Maps are cached per project path for a short TTL; on any pipeline
    /// failure a minimal fallback summary is returned instead.
    pub async fn build_repo_map_context(&self, project_path: &Path, max_tokens: usize) -> String {
        debug!(?project_path, max_tokens, "ContextBuilder::build_repo_map_context: called");

        let mut cache = self.repo_map_cache.lock().await;
        let fresh = cache
            .get(project_path)
            .map(|c| c.created.elapsed() < REPO_MAP_TTL)
            .unwrap_or(false);

        if !fresh {
            debug!(?project_path, "ContextBuilder::build_repo_map_context: cache miss");
            let generator = RepoMapGenerator::new(GeneratorOptions {
                max_files: self.analysis_config.max_files,
                include_patterns: self.analysis_config.include_patterns.clone(),
                exclude_patterns: self.analysis_config.exclude_patterns.clone(),
                extract_docs: self.analysis_config.extract_docs,
                count_references: self.analysis_config.count_references,
                ..Default::default()
            });
            match generator.generate(project_path) {
                Ok(map) => {
                    cache.insert(
                        project_path.to_path_buf(),
                        CachedMap {
                            map,
                            created: Instant::now(),
                        },
                    );
                }
                Err(e) => {
                    warn!(?project_path, error = %e, "Repo map generation failed");
                    return format!(
                        "Repo map: {}\n(full repo map unavailable: {})",
                        project_path.display(),
                        e
                    );
                }
            }
        }

        let map = &cache.get(project_path).expect("just inserted").map;
        RepoFormatter::new(FormatOptions {
            max_tokens,
            ..Default::default()
        })
        .format(map)
    }

    /// Architectural patterns and public API surface relevant to the task.
    ///
    /// Derived from the cached repo map: the most-connected files become
    /// pattern lines, exported top-level symbols become API lines. A line
    /// survives the relevance filter when its file shares a directory with
    /// one of the task's files (tasks without files keep everything).
    pub async fn build_codebase_docs_context(&self, project_path: &Path, task: &Task, max_tokens: usize) -> String {
        debug!(?project_path, task_id = %task.id, max_tokens, "ContextBuilder::build_codebase_docs_context: called");

        // reuse (or populate) the cached map through the repo-map path
        let _ = self.build_repo_map_context(project_path, max_tokens).await;
        let cache = self.repo_map_cache.lock().await;
        let Some(cached) = cache.get(project_path) else {
            return String::new();
        };
        let map = &cached.map;

        let task_dirs: Vec<&str> = task.target_files.iter().map(|f| parent_dir(f)).collect();
        let relevant = |file: &str| task_dirs.is_empty() || task_dirs.contains(&parent_dir(file));

        let mut lines = vec!["Codebase architecture:".to_string()];

        let patterns: Vec<String> = map
            .stats
            .most_connected
            .iter()
            .filter(|(file, _)| relevant(file))
            .take(MAX_PATTERNS)
            .map(|(file, degree)| format!("- {} is a hub ({} connections)", file, degree))
            .collect();
        lines.extend(patterns);

        let apis: Vec<String> = map
            .symbols
            .iter()
            .filter(|s| s.exported && s.is_top_level() && relevant(&s.file))
            .take(MAX_APIS)
            .map(|s| {
                if s.signature.is_empty() {
                    format!("- {} {} ({})", s.kind, s.name, s.file)
                } else {
                    format!("- {} ({})", s.signature, s.file)
                }
            })
            .collect();
        if !apis.is_empty() {
            lines.push("Public API:".to_string());
            lines.extend(apis);
        }

        let fitted = prefix_fit(lines, max_tokens, |l| l.as_str());
        fitted.join("\n")
    }

    /// Read files in parallel, score them by relevance, and greedily admit
    /// the best until the budget is reached.
    pub async fn build_file_context(&self, files: &[String], task: &Task, max_tokens: usize) -> Vec<FileContextEntry> {
        debug!(count = files.len(), max_tokens, "ContextBuilder::build_file_context: called");

        let reads = files.iter().map(|file| {
            let path = self.project_root.join(file);
            async move { (file.clone(), tokio::fs::read_to_string(path).await) }
        });
        let contents = futures::future::join_all(reads).await;

        let mut entries: Vec<FileContextEntry> = Vec::new();
        for (file, result) in contents {
            let content = match result {
                Ok(content) => content,
                Err(e) => {
                    debug!(%file, error = %e, "ContextBuilder::build_file_context: unreadable, skipping");
                    continue;
                }
            };
            if content.chars().count() > self.context_config.max_file_size_chars {
                debug!(%file, "ContextBuilder::build_file_context: over size cap, skipping");
                continue;
            }

            let relevance = classify_file(&file, task);
            let tokens = estimate_tokens(&content);
            entries.push(FileContextEntry {
                path: file,
                content,
                score: relevance.score(),
                relevance,
                tokens,
            });
        }

        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut used = 0;
        let mut admitted = Vec::new();
        for entry in entries {
            if used + entry.tokens > max_tokens {
                break;
            }
            used += entry.tokens;
            admitted.push(entry);
        }

        debug!(admitted = admitted.len(), used, "ContextBuilder::build_file_context: complete");
        admitted
    }

    /// Semantic code matches for a query, prefix-fit to the budget.
    pub async fn build_code_context(&self, query: &str, max_tokens: usize) -> Vec<CodeHit> {
        debug!(%query, max_tokens, "ContextBuilder::build_code_context: called");
        let Some(code_memory) = &self.code_memory else {
            return vec![];
        };

        let options = CodeSearchOptions {
            limit: 20,
            threshold: self.context_config.min_code_relevance,
            include_context: true,
        };
        match code_memory.search_code(query, &options).await {
            Ok(hits) => prefix_fit(hits, max_tokens, |h| h.content.as_str()),
            Err(e) => {
                warn!(error = %e, "Code search failed; dropping component");
                vec![]
            }
        }
    }

    /// Memory hits for the task, prefix-fit to the budget.
    pub async fn build_memory_context(&self, task: &Task, max_tokens: usize) -> Vec<MemoryHit> {
        debug!(task_id = %task.id, max_tokens, "ContextBuilder::build_memory_context: called");
        let Some(memory) = &self.memory else {
            return vec![];
        };

        let query = format!("{} {}", task.name, task.description);
        let options = MemorySearchOptions {
            limit: 10,
            threshold: self.context_config.min_memory_relevance,
        };
        match memory.search(&query, &options).await {
            Ok(hits) => prefix_fit(hits, max_tokens, |h| h.content.as_str()),
            Err(e) => {
                warn!(error = %e, "Memory search failed; dropping component");
                vec![]
            }
        }
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Relevance from filename and path heuristics.
fn classify_file(path: &str, task: &Task) -> FileRelevance {
    if task.target_files.iter().any(|f| f == path) {
        return FileRelevance::TaskFile;
    }
    let name = path.rsplit('/').next().unwrap_or(path);
    if path.ends_with(".d.ts") || path.contains("/types/") {
        return FileRelevance::TypeDefinition;
    }
    if name.contains(".test.") || name.contains(".spec.") || path.contains("__tests__") {
        return FileRelevance::Test;
    }
    if path.starts_with("node_modules/") || path.contains("/vendor/") {
        return FileRelevance::Dependency;
    }
    if task.target_files.iter().any(|f| parent_dir(f) == parent_dir(path)) {
        return FileRelevance::Related;
    }
    FileRelevance::Requested
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn builder(root: &Path) -> ContextBuilder {
        ContextBuilder::new(root, ContextConfig::default(), AnalysisConfig::default())
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_classify_file() {
        let task = Task::new("t", "d").with_target_files(vec!["src/auth/login.ts".to_string()]);
        assert_eq!(classify_file("src/auth/login.ts", &task), FileRelevance::TaskFile);
        assert_eq!(classify_file("src/auth/session.ts", &task), FileRelevance::Related);
        assert_eq!(classify_file("src/auth/login.test.ts", &task), FileRelevance::Test);
        assert_eq!(classify_file("src/types/user.d.ts", &task), FileRelevance::TypeDefinition);
        assert_eq!(classify_file("node_modules/lib/index.ts", &task), FileRelevance::Dependency);
        assert_eq!(classify_file("docs/readme.ts", &task), FileRelevance::Requested);
    }

    #[test]
    fn test_score_table_ordering() {
        assert!(FileRelevance::TaskFile.score() > FileRelevance::Requested.score());
        assert!(FileRelevance::Requested.score() > FileRelevance::TypeDefinition.score());
        assert!(FileRelevance::Related.score() > FileRelevance::Dependency.score());
    }

    #[tokio::test]
    async fn test_repo_map_context_and_cache() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/a.ts", "export const a = 1;\n");

        let builder = builder(temp.path());
        let first = builder.build_repo_map_context(temp.path(), 1000).await;
        assert!(first.contains("Repo map"));

        // second call is served from cache even if the tree changes
        write(temp.path(), "src/b.ts", "export const b = 1;\n");
        let second = builder.build_repo_map_context(temp.path(), 1000).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_repo_map_fallback_on_missing_dir() {
        let temp = tempdir().unwrap();
        let builder = builder(temp.path());
        let missing = temp.path().join("does-not-exist");
        let text = builder.build_repo_map_context(&missing, 1000).await;
        assert!(text.contains("full repo map unavailable"));
    }

    #[tokio::test]
    async fn test_file_context_reads_and_orders() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/main.ts", "export const main = 1;\n");
        write(temp.path(), "src/main.test.ts", "import { main } from './main';\n");

        let task = Task::new("t", "d").with_target_files(vec!["src/main.ts".to_string()]);
        let builder = builder(temp.path());
        let entries = builder
            .build_file_context(
                &["src/main.test.ts".to_string(), "src/main.ts".to_string()],
                &task,
                10_000,
            )
            .await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].relevance, FileRelevance::TaskFile);
        assert_eq!(entries[1].relevance, FileRelevance::Test);
    }

    #[tokio::test]
    async fn test_file_context_budget_greedy() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/big.ts", &"x".repeat(4000));
        write(temp.path(), "src/small.ts", "const s = 1;\n");

        let task = Task::new("t", "d").with_target_files(vec!["src/big.ts".to_string()]);
        let builder = builder(temp.path());
        // big file is 1000 tokens; budget admits it but not the second file
        let entries = builder
            .build_file_context(&["src/big.ts".to_string(), "src/small.ts".to_string()], &task, 1001)
            .await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "src/big.ts");
    }

    #[tokio::test]
    async fn test_file_context_skips_oversized_and_missing() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/huge.ts", &"y".repeat(60_000));

        let task = Task::new("t", "d");
        let builder = builder(temp.path());
        let entries = builder
            .build_file_context(&["src/huge.ts".to_string(), "src/gone.ts".to_string()], &task, 100_000)
            .await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_code_context_without_backend_is_empty() {
        let temp = tempdir().unwrap();
        let builder = builder(temp.path());
        assert!(builder.build_code_context("anything", 1000).await.is_empty());
    }

    #[tokio::test]
    async fn test_code_context_with_grep_backend() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/auth.ts", "export function loginUser() {}\n");

        let builder = builder(temp.path())
            .with_code_memory(std::sync::Arc::new(super::super::memory::GrepCodeMemory::new(temp.path())));
        let hits = builder.build_code_context("loginUser", 1000).await;
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_codebase_docs_relevance_filter() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/auth/login.ts", "export function login() {\n}\n");
        write(temp.path(), "src/billing/invoice.ts", "export function invoice() {\n}\n");

        let task = Task::new("t", "d").with_target_files(vec!["src/auth/session.ts".to_string()]);
        let builder = builder(temp.path());
        let docs = builder.build_codebase_docs_context(temp.path(), &task, 2000).await;

        assert!(docs.contains("login"));
        assert!(!docs.contains("invoice"));
    }
}

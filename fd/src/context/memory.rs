//! Memory backend seams
//!
//! The context builder treats code search and general memory as external
//! collaborators behind narrow traits. A grep-backed local code search
//! ships in-tree as the default; vector-backed implementations plug in the
//! same way.

use std::path::PathBuf;

use async_trait::async_trait;
use eyre::Result;
use grep_regex::RegexMatcher;
use grep_searcher::Searcher;
use grep_searcher::sinks::UTF8;
use tracing::debug;
use walkdir::WalkDir;

/// Options for a code search
#[derive(Debug, Clone)]
pub struct CodeSearchOptions {
    pub limit: usize,
    pub threshold: f64,
    pub include_context: bool,
}

impl Default for CodeSearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            threshold: 0.3,
            include_context: false,
        }
    }
}

/// One code-search hit
#[derive(Debug, Clone)]
pub struct CodeHit {
    /// Matched chunk content
    pub content: String,

    /// Source file, when known
    pub path: Option<String>,

    /// Relevance in [0, 1]
    pub score: f64,
}

/// Code-search capability
#[async_trait]
pub trait CodeMemory: Send + Sync {
    async fn search_code(&self, query: &str, options: &CodeSearchOptions) -> Result<Vec<CodeHit>>;
}

/// Options for a general memory search
#[derive(Debug, Clone)]
pub struct MemorySearchOptions {
    pub limit: usize,
    pub threshold: f64,
}

impl Default for MemorySearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.3,
        }
    }
}

/// One memory hit
#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub source: String,
}

/// General memory capability
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn search(&self, query: &str, options: &MemorySearchOptions) -> Result<Vec<MemoryHit>>;
}

/// Grep-backed local code search over a project tree.
///
/// Scores each matching line by the fraction of query terms it contains.
/// Not semantic, but good enough to seed context when no vector backend is
/// configured.
pub struct GrepCodeMemory {
    root: PathBuf,

    /// Backend-side cap on returned usages; the effective limit is the
    /// smaller of this and the caller's limit
    max_usages: usize,
}

impl GrepCodeMemory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_usages: 50,
        }
    }

    pub fn with_max_usages(mut self, max_usages: usize) -> Self {
        self.max_usages = max_usages;
        self
    }
}

#[async_trait]
impl CodeMemory for GrepCodeMemory {
    async fn search_code(&self, query: &str, options: &CodeSearchOptions) -> Result<Vec<CodeHit>> {
        debug!(%query, limit = options.limit, "GrepCodeMemory::search_code: called");
        let terms: Vec<String> = query
            .split_whitespace()
            .filter(|t| t.len() >= 3)
            .map(|t| regex::escape(t))
            .collect();
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let pattern = format!("(?i)({})", terms.join("|"));
        let matcher = RegexMatcher::new(&pattern)?;
        let mut searcher = Searcher::new();

        let mut hits: Vec<CodeHit> = Vec::new();
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.file_name().to_string_lossy() != "node_modules")
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || repomap::detect_language(entry.path()).is_none() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            let mut file_hits: Vec<(u64, String)> = Vec::new();
            searcher.search_path(
                &matcher,
                entry.path(),
                UTF8(|line_number, line| {
                    file_hits.push((line_number, line.to_string()));
                    Ok(true)
                }),
            )?;

            for (line_number, line) in file_hits {
                let lower = line.to_lowercase();
                let matched = terms
                    .iter()
                    .filter(|t| lower.contains(&t.to_lowercase()))
                    .count();
                let score = matched as f64 / terms.len() as f64;
                if score < options.threshold {
                    continue;
                }
                let content = if options.include_context {
                    format!("{}:{}: {}", rel, line_number, line.trim_end())
                } else {
                    line.trim_end().to_string()
                };
                hits.push(CodeHit {
                    content,
                    path: Some(rel.clone()),
                    score,
                });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // when both the caller limit and the backend cap are set, the
        // smaller wins
        let limit = options.limit.min(self.max_usages);
        hits.truncate(limit);

        debug!(hits = hits.len(), "GrepCodeMemory::search_code: complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &std::path::Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_finds_matching_lines() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/auth.ts", "export function loginUser() {\n  return checkPassword();\n}\n");
        write(temp.path(), "src/other.ts", "export const unrelated = 1;\n");

        let memory = GrepCodeMemory::new(temp.path());
        let hits = memory
            .search_code("loginUser password", &CodeSearchOptions::default())
            .await
            .unwrap();

        assert!(!hits.is_empty());
        assert!(hits.iter().any(|h| h.content.contains("loginUser")));
        assert!(hits.iter().all(|h| h.path.as_deref() == Some("src/auth.ts")));
    }

    #[tokio::test]
    async fn test_threshold_filters_weak_matches() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/a.ts", "const loginUser = 1;\n");

        let memory = GrepCodeMemory::new(temp.path());
        let options = CodeSearchOptions {
            threshold: 0.9,
            ..Default::default()
        };
        // only one of the two terms appears on the line
        let hits = memory.search_code("loginUser missingTerm", &options).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_limit_is_min_of_caller_and_backend() {
        let temp = tempdir().unwrap();
        let body: String = (0..30).map(|i| format!("const loginUser{} = 1;\n", i)).collect();
        write(temp.path(), "src/many.ts", &body);

        let memory = GrepCodeMemory::new(temp.path()).with_max_usages(5);
        let options = CodeSearchOptions {
            limit: 20,
            ..Default::default()
        };
        let hits = memory.search_code("loginUser", &options).await.unwrap();
        assert_eq!(hits.len(), 5);

        let memory = GrepCodeMemory::new(temp.path()).with_max_usages(50);
        let options = CodeSearchOptions {
            limit: 3,
            ..Default::default()
        };
        let hits = memory.search_code("loginUser", &options).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_include_context_prefixes_location() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/a.ts", "function loginUser() {}\n");

        let memory = GrepCodeMemory::new(temp.path());
        let options = CodeSearchOptions {
            include_context: true,
            ..Default::default()
        };
        let hits = memory.search_code("loginUser", &options).await.unwrap();
        assert!(hits[0].content.starts_with("src/a.ts:1:"));
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let temp = tempdir().unwrap();
        let memory = GrepCodeMemory::new(temp.path());
        let hits = memory.search_code("a b", &CodeSearchOptions::default()).await.unwrap();
        assert!(hits.is_empty());
    }
}

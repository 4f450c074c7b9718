//! File dependency graph
//!
//! Consumes parse results for a whole repo and resolves import specifiers
//! into edges between known files. External modules produce no edges;
//! forward and reverse adjacency indexes make the common queries O(degree).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::language::SOURCE_EXTENSIONS;
use crate::parser::ParseResult;
use crate::symbol::ImportKind;

/// Canonicalize a path to forward-slash form and strip a leading `./`.
///
/// Every path entering the graph goes through this; all comparisons and
/// index keys use the normalized form.
pub fn normalize_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    normalized.strip_prefix("./").unwrap_or(&normalized).to_string()
}

/// Why one file depends on another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Import,
    Require,
    Dynamic,
    ExportFrom,
    TypeImport,
    SideEffect,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeKind::Import => "import",
            EdgeKind::Require => "require",
            EdgeKind::Dynamic => "dynamic",
            EdgeKind::ExportFrom => "export_from",
            EdgeKind::TypeImport => "type_import",
            EdgeKind::SideEffect => "side_effect",
        };
        write!(f, "{}", s)
    }
}

/// A directed dependency between two known files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Importing file (normalized)
    pub from: String,

    /// Imported file (normalized); always a member of the known-file set
    pub to: String,

    pub kind: EdgeKind,

    /// Symbol names flowing across the edge
    pub symbols: Vec<String>,

    /// Line of the originating statement
    pub line: Option<u32>,
}

/// The resolved dependency graph of a repository
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: Vec<DependencyEdge>,

    /// file -> indexes of edges leaving it
    forward: HashMap<String, Vec<usize>>,

    /// file -> indexes of edges entering it
    reverse: HashMap<String, Vec<usize>>,

    /// All files that participated in the build (normalized)
    files: Vec<String>,
}

impl DependencyGraph {
    /// Build the graph from parse results.
    ///
    /// `aliases` maps import-specifier prefixes to root-relative path
    /// prefixes (`"@/"` -> `"src/"`). Unresolved imports (external packages,
    /// missing files) produce no edge.
    pub fn build(results: &[ParseResult], aliases: &HashMap<String, String>) -> Self {
        debug!(files = results.len(), aliases = aliases.len(), "DependencyGraph::build: called");
        let known: HashSet<String> = results.iter().map(|r| normalize_path(&r.file)).collect();

        let mut graph = DependencyGraph {
            files: {
                let mut files: Vec<String> = known.iter().cloned().collect();
                files.sort();
                files
            },
            ..Default::default()
        };

        for result in results {
            let from = normalize_path(&result.file);

            for import in &result.imports {
                let Some(to) = resolve_import(&import.source, &from, aliases, &known) else {
                    continue;
                };
                let kind = match import.kind {
                    ImportKind::Require => EdgeKind::Require,
                    ImportKind::Dynamic => EdgeKind::Dynamic,
                    ImportKind::SideEffect => EdgeKind::SideEffect,
                    _ if import.type_only => EdgeKind::TypeImport,
                    _ => EdgeKind::Import,
                };
                graph.push_edge(DependencyEdge {
                    from: from.clone(),
                    to,
                    kind,
                    symbols: import.symbols.iter().map(|s| s.source_name().to_string()).collect(),
                    line: Some(import.line),
                });
            }

            for export in &result.exports {
                let Some(source) = &export.source else { continue };
                let Some(to) = resolve_import(source, &from, aliases, &known) else {
                    continue;
                };
                graph.push_edge(DependencyEdge {
                    from: from.clone(),
                    to,
                    kind: EdgeKind::ExportFrom,
                    symbols: export.symbols.iter().map(|s| s.source_name().to_string()).collect(),
                    line: Some(export.line),
                });
            }
        }

        debug!(edges = graph.edges.len(), "DependencyGraph::build: complete");
        graph
    }

    /// Rebuild a graph from previously materialized edges (e.g. a stored
    /// [`RepoMap`](crate::map::RepoMap)).
    pub fn from_edges(edges: Vec<DependencyEdge>, files: Vec<String>) -> Self {
        let mut graph = DependencyGraph {
            files: {
                let mut files = files;
                files.sort();
                files
            },
            ..Default::default()
        };
        for edge in edges {
            graph.push_edge(edge);
        }
        graph
    }

    fn push_edge(&mut self, edge: DependencyEdge) {
        let idx = self.edges.len();
        self.forward.entry(edge.from.clone()).or_default().push(idx);
        self.reverse.entry(edge.to.clone()).or_default().push(idx);
        self.edges.push(edge);
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// All known files, sorted.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Files that `file` imports (deduplicated, in edge order).
    pub fn dependencies(&self, file: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.forward
            .get(file)
            .into_iter()
            .flatten()
            .map(|&i| self.edges[i].to.clone())
            .filter(|f| seen.insert(f.clone()))
            .collect()
    }

    /// Files that import `file` (deduplicated, in edge order).
    pub fn dependents(&self, file: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.reverse
            .get(file)
            .into_iter()
            .flatten()
            .map(|&i| self.edges[i].from.clone())
            .filter(|f| seen.insert(f.clone()))
            .collect()
    }

    /// Every edge entering or leaving `file`.
    pub fn edges_touching(&self, file: &str) -> Vec<&DependencyEdge> {
        let mut indexes: Vec<usize> = self
            .forward
            .get(file)
            .into_iter()
            .flatten()
            .chain(self.reverse.get(file).into_iter().flatten())
            .copied()
            .collect();
        indexes.sort_unstable();
        indexes.dedup();
        indexes.into_iter().map(|i| &self.edges[i]).collect()
    }

    /// Inbound edge count for a file.
    pub fn indegree(&self, file: &str) -> usize {
        self.reverse.get(file).map(|v| v.len()).unwrap_or(0)
    }

    /// Outbound edge count for a file.
    pub fn outdegree(&self, file: &str) -> usize {
        self.forward.get(file).map(|v| v.len()).unwrap_or(0)
    }

    /// Detect import cycles.
    ///
    /// Iterative depth-first traversal from each unvisited node with a
    /// recursion-stack set; when an edge closes onto a file already on the
    /// current path, the slice of the path starting at that file is emitted
    /// as one cycle. A self-import yields a cycle of length 1.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        debug!("DependencyGraph::find_cycles: called");
        let mut cycles = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();

        for start in &self.files {
            if visited.contains(start) {
                continue;
            }

            let mut stack: Vec<(String, Vec<String>, usize)> = vec![(start.clone(), self.dependencies(start), 0)];
            let mut path: Vec<String> = vec![start.clone()];
            let mut on_path: HashSet<String> = HashSet::from([start.clone()]);
            visited.insert(start.clone());

            while let Some(frame) = stack.last_mut() {
                if frame.2 < frame.1.len() {
                    let next = frame.1[frame.2].clone();
                    frame.2 += 1;

                    if on_path.contains(&next) {
                        let pos = path.iter().position(|p| p == &next).unwrap();
                        cycles.push(path[pos..].to_vec());
                    } else if !visited.contains(&next) {
                        visited.insert(next.clone());
                        on_path.insert(next.clone());
                        path.push(next.clone());
                        let deps = self.dependencies(&next);
                        stack.push((next, deps, 0));
                    }
                } else {
                    let (node, _, _) = stack.pop().unwrap();
                    on_path.remove(&node);
                    path.pop();
                }
            }
        }

        debug!(cycles = cycles.len(), "DependencyGraph::find_cycles: complete");
        cycles
    }

    /// Files sorted by total degree descending, path ascending on ties.
    pub fn sort_by_connections(&self) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> = self
            .files
            .iter()
            .map(|f| (f.clone(), self.indegree(f) + self.outdegree(f)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Length of the longest acyclic dependency path starting at `file`.
    ///
    /// Memoized DFS; nodes already on the current path contribute 0 so
    /// cycles stay bounded.
    pub fn depth(&self, file: &str) -> usize {
        let mut memo = HashMap::new();
        let mut visiting = HashSet::new();
        self.depth_inner(file, &mut memo, &mut visiting)
    }

    fn depth_inner(&self, file: &str, memo: &mut HashMap<String, usize>, visiting: &mut HashSet<String>) -> usize {
        if let Some(&d) = memo.get(file) {
            return d;
        }
        if !visiting.insert(file.to_string()) {
            return 0;
        }
        let depth = self
            .dependencies(file)
            .iter()
            .map(|dep| 1 + self.depth_inner(dep, memo, visiting))
            .max()
            .unwrap_or(0);
        visiting.remove(file);
        memo.insert(file.to_string(), depth);
        depth
    }
}

/// Resolve an import specifier from `from_file` against the known-file set.
///
/// Alias prefixes substitute to root-relative paths; relative specifiers
/// resolve against the importing file's directory; everything else is an
/// external module and resolves to `None`. Candidate probing tries the
/// literal path, each source extension, then `index.<ext>`; first known
/// file wins.
pub fn resolve_import(
    source: &str,
    from_file: &str,
    aliases: &HashMap<String, String>,
    known: &HashSet<String>,
) -> Option<String> {
    let base = if let Some((prefix, replacement)) = aliases.iter().find(|(prefix, _)| source.starts_with(prefix.as_str())) {
        let rest = &source[prefix.len()..];
        normalize_path(&format!("{}{}", replacement, rest))
    } else if source.starts_with('.') {
        let dir = match from_file.rfind('/') {
            Some(idx) => &from_file[..idx],
            None => "",
        };
        join_segments(dir, source)
    } else {
        // scoped package or bare identifier: external
        return None;
    };

    candidate_paths(&base).into_iter().find(|c| known.contains(c))
}

/// Probe order: literal, each extension appended, then `/index.<ext>`.
fn candidate_paths(base: &str) -> Vec<String> {
    let mut candidates = vec![base.to_string()];
    for ext in SOURCE_EXTENSIONS {
        candidates.push(format!("{}.{}", base, ext));
    }
    for ext in SOURCE_EXTENSIONS {
        candidates.push(format!("{}/index.{}", base, ext));
    }
    candidates
}

/// Join a relative specifier onto a directory, resolving `.` and `..`.
fn join_segments(dir: &str, spec: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in spec.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

//! Token-bounded textual projections of a repo map
//!
//! Three styles share one token-accounting skeleton: lines are admitted
//! greedily in rank order until the next line would overflow the budget,
//! at which point a truncation marker is emitted and the projection stops.
//! The output always fits the budget under the shared
//! [`estimate_tokens`](crate::estimate_tokens) convention.

use std::collections::HashMap;

use tracing::debug;

use crate::estimate_tokens;
use crate::map::RepoMap;
use crate::symbol::{Symbol, SymbolKind};

/// Marker emitted at the point of cutoff.
const TRUNCATION_MARKER: &str = "... (truncated)";

/// Projection style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatStyle {
    /// One line per symbol, grouped by file
    #[default]
    Compact,
    /// Signatures and doc summaries included
    Detailed,
    /// Directory tree with per-file symbol lists
    Tree,
}

impl std::str::FromStr for FormatStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(FormatStyle::Compact),
            "detailed" => Ok(FormatStyle::Detailed),
            "tree" => Ok(FormatStyle::Tree),
            other => Err(format!("Unknown format style: {}", other)),
        }
    }
}

/// Formatter configuration
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub style: FormatStyle,

    /// Token budget for the whole projection
    pub max_tokens: usize,

    /// Group symbols under their defining file (compact style)
    pub group_by_file: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            style: FormatStyle::Compact,
            max_tokens: 4000,
            group_by_file: true,
        }
    }
}

/// Renders a [`RepoMap`] into bounded text
#[derive(Debug, Clone, Default)]
pub struct RepoFormatter {
    options: FormatOptions,
}

/// Greedy line writer that refuses lines past the budget.
struct BudgetWriter {
    budget: usize,
    used: usize,
    out: String,
    truncated: bool,
}

impl BudgetWriter {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            used: 0,
            out: String::new(),
            truncated: false,
        }
    }

    /// Append a line if it fits; on the first refusal, emit the truncation
    /// marker (when it fits) and refuse everything after.
    fn push_line(&mut self, line: &str) -> bool {
        if self.truncated {
            return false;
        }
        // +1 for the newline
        let cost = estimate_tokens(line) + 1;
        if self.used + cost <= self.budget {
            self.out.push_str(line);
            self.out.push('\n');
            self.used += cost;
            true
        } else {
            self.truncated = true;
            let marker_cost = estimate_tokens(TRUNCATION_MARKER) + 1;
            if self.used + marker_cost <= self.budget {
                self.out.push_str(TRUNCATION_MARKER);
                self.out.push('\n');
                self.used += marker_cost;
            }
            false
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

impl RepoFormatter {
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Render the map within the configured token budget.
    pub fn format(&self, map: &RepoMap) -> String {
        debug!(style = ?self.options.style, max_tokens = self.options.max_tokens, "RepoFormatter::format: called");
        let mut writer = BudgetWriter::new(self.options.max_tokens);

        writer.push_line(&format!(
            "Repo map: {} files, {} symbols, {} edges",
            map.stats.total_files, map.stats.total_symbols, map.stats.total_edges
        ));

        match self.options.style {
            FormatStyle::Compact => self.format_compact(map, &mut writer),
            FormatStyle::Detailed => self.format_detailed(map, &mut writer),
            FormatStyle::Tree => self.format_tree(map, &mut writer),
        }

        writer.finish()
    }

    fn format_compact(&self, map: &RepoMap, writer: &mut BudgetWriter) {
        if self.options.group_by_file {
            for (file, symbols) in grouped_by_file(map) {
                if !writer.push_line(&format!("{}:", file)) {
                    return;
                }
                for (symbol, indent) in symbols {
                    let refs = refs_suffix(symbol);
                    let line = format!("{}{} {}{}", "  ".repeat(indent + 1), glyph(symbol.kind), symbol.name, refs);
                    if !writer.push_line(&line) {
                        return;
                    }
                }
            }
        } else {
            for symbol in ranked_symbols(map) {
                let line = format!(
                    "{} {} — {}:{}{}",
                    glyph(symbol.kind),
                    symbol.name,
                    symbol.file,
                    symbol.line,
                    refs_suffix(symbol)
                );
                if !writer.push_line(&line) {
                    return;
                }
            }
        }
    }

    fn format_detailed(&self, map: &RepoMap, writer: &mut BudgetWriter) {
        for (file, symbols) in grouped_by_file(map) {
            if !writer.push_line(&format!("{}:", file)) {
                return;
            }
            for (symbol, indent) in symbols {
                let pad = "  ".repeat(indent + 1);
                let line = if symbol.signature.is_empty() {
                    format!("{}{} {}{}", pad, glyph(symbol.kind), symbol.name, refs_suffix(symbol))
                } else {
                    format!("{}{} {}{}", pad, glyph(symbol.kind), symbol.signature, refs_suffix(symbol))
                };
                if !writer.push_line(&line) {
                    return;
                }
                if let Some(doc) = &symbol.doc
                    && let Some(first) = doc.lines().next()
                    && !writer.push_line(&format!("{}  · {}", pad, first))
                {
                    return;
                }
            }
        }
    }

    fn format_tree(&self, map: &RepoMap, writer: &mut BudgetWriter) {
        let mut files: Vec<&str> = map.files.iter().map(|f| f.path.as_str()).collect();
        files.sort_unstable();

        let mut printed_dirs: Vec<String> = Vec::new();
        for file in files {
            let segments: Vec<&str> = file.split('/').collect();
            let (dirs, name) = segments.split_at(segments.len() - 1);

            // print any directory segments not already open
            for (depth, dir) in dirs.iter().enumerate() {
                let open = printed_dirs.get(depth).map(|d| d == dir).unwrap_or(false);
                if !open {
                    printed_dirs.truncate(depth);
                    printed_dirs.push(dir.to_string());
                    if !writer.push_line(&format!("{}{}/", "  ".repeat(depth), dir)) {
                        return;
                    }
                }
            }
            printed_dirs.truncate(dirs.len());

            let depth = dirs.len();
            if !writer.push_line(&format!("{}{}", "  ".repeat(depth), name[0])) {
                return;
            }
            for symbol in file_symbols(map, file) {
                let line = format!(
                    "{}{} {}{}",
                    "  ".repeat(depth + 1),
                    glyph(symbol.kind),
                    symbol.name,
                    refs_suffix(symbol)
                );
                if !writer.push_line(&line) {
                    return;
                }
            }
        }
    }
}

/// One-character kind prefix; differentiates kinds without costing tokens.
fn glyph(kind: SymbolKind) -> char {
    match kind {
        SymbolKind::Class => 'C',
        SymbolKind::Interface => 'I',
        SymbolKind::Function => 'F',
        SymbolKind::Method => 'm',
        SymbolKind::Property => 'p',
        SymbolKind::Variable => 'v',
        SymbolKind::Constant => 'c',
        SymbolKind::Type => 't',
        SymbolKind::Enum => 'E',
        SymbolKind::EnumMember => 'e',
        SymbolKind::Namespace => 'N',
        SymbolKind::Module => 'M',
    }
}

fn refs_suffix(symbol: &Symbol) -> String {
    if symbol.references > 0 {
        format!(" ({})", symbol.references)
    } else {
        String::new()
    }
}

/// Selection order: references desc, exported first, top-level first,
/// name asc.
fn ranked_symbols(map: &RepoMap) -> Vec<&Symbol> {
    let mut symbols: Vec<&Symbol> = map.symbols.iter().collect();
    symbols.sort_by(|a, b| {
        b.references
            .cmp(&a.references)
            .then_with(|| b.exported.cmp(&a.exported))
            .then_with(|| b.is_top_level().cmp(&a.is_top_level()))
            .then_with(|| a.name.cmp(&b.name))
    });
    symbols
}

/// Top-level symbols of one file in selection order, children indented one
/// level beneath their parent.
fn file_symbols<'a>(map: &'a RepoMap, file: &str) -> Vec<&'a Symbol> {
    let mut symbols: Vec<&Symbol> = map.symbols.iter().filter(|s| s.file == file && s.is_top_level()).collect();
    symbols.sort_by(|a, b| {
        b.references
            .cmp(&a.references)
            .then_with(|| b.exported.cmp(&a.exported))
            .then_with(|| a.name.cmp(&b.name))
    });
    symbols
}

/// Files ordered by total inbound references (desc, path asc), each paired
/// with `(symbol, indent)` rows: top-level symbols at indent 0 followed by
/// their children at indent 1.
fn grouped_by_file(map: &RepoMap) -> Vec<(String, Vec<(&Symbol, usize)>)> {
    let mut file_refs: HashMap<&str, u32> = HashMap::new();
    for file in &map.files {
        file_refs.insert(file.path.as_str(), map.file_references(&file.path));
    }

    let mut files: Vec<&str> = map.files.iter().map(|f| f.path.as_str()).collect();
    files.sort_by(|a, b| {
        let ra = file_refs.get(a).copied().unwrap_or(0);
        let rb = file_refs.get(b).copied().unwrap_or(0);
        rb.cmp(&ra).then_with(|| a.cmp(b))
    });

    files
        .into_iter()
        .map(|file| {
            let mut rows: Vec<(&Symbol, usize)> = Vec::new();
            for symbol in file_symbols(map, file) {
                rows.push((symbol, 0));
                for child in map.symbols.iter().filter(|s| s.parent_id.as_deref() == Some(&symbol.id)) {
                    rows.push((child, 1));
                }
            }
            (file.to_string(), rows)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{FileMetadata, RepoStats};
    use crate::symbol::symbol_id;
    use chrono::Utc;

    fn make_map(symbol_count: usize) -> RepoMap {
        let mut symbols = Vec::new();
        let mut files = Vec::new();
        for f in 0..symbol_count.div_ceil(4).max(1) {
            let path = format!("src/file{}.ts", f);
            files.push(FileMetadata {
                path: path.clone(),
                language: crate::language::Language::TypeScript,
                lines: 10,
                symbol_count: 4,
                import_count: 0,
                export_count: 0,
                parse_success: true,
            });
        }
        for i in 0..symbol_count {
            let path = format!("src/file{}.ts", i / 4);
            let mut symbol = Symbol::new(format!("symbol{}", i), SymbolKind::Function, path, (i as u32 % 4) + 1);
            symbol.exported = i % 2 == 0;
            symbol.references = (i % 7) as u32;
            symbol.signature = format!("export function symbol{}(): void", i);
            symbols.push(symbol);
        }
        RepoMap {
            project_root: "/tmp/project".to_string(),
            generated_at: Utc::now(),
            stats: RepoStats {
                total_files: files.len(),
                total_symbols: symbols.len(),
                ..Default::default()
            },
            files,
            symbols,
            edges: vec![],
            ranked: vec![],
        }
    }

    #[test]
    fn test_compact_contains_symbols_and_glyphs() {
        let map = make_map(8);
        let out = RepoFormatter::default().format(&map);
        assert!(out.contains("symbol0"));
        assert!(out.contains("F symbol0"));
        assert!(out.contains("src/file0.ts:"));
    }

    #[test]
    fn test_truncation_marker_on_small_budget() {
        let map = make_map(200);
        let formatter = RepoFormatter::new(FormatOptions {
            max_tokens: 50,
            ..Default::default()
        });
        let out = formatter.format(&map);
        assert!(out.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn test_budget_respected() {
        let map = make_map(300);
        for budget in [10, 50, 400, 4000] {
            let formatter = RepoFormatter::new(FormatOptions {
                max_tokens: budget,
                ..Default::default()
            });
            let out = formatter.format(&map);
            assert!(
                estimate_tokens(&out) <= budget,
                "budget {} exceeded: {}",
                budget,
                estimate_tokens(&out)
            );
        }
    }

    #[test]
    fn test_detailed_includes_signatures() {
        let map = make_map(4);
        let formatter = RepoFormatter::new(FormatOptions {
            style: FormatStyle::Detailed,
            ..Default::default()
        });
        let out = formatter.format(&map);
        assert!(out.contains("export function symbol0(): void"));
    }

    #[test]
    fn test_tree_prints_directories() {
        let map = make_map(4);
        let formatter = RepoFormatter::new(FormatOptions {
            style: FormatStyle::Tree,
            ..Default::default()
        });
        let out = formatter.format(&map);
        assert!(out.contains("src/"));
        assert!(out.contains("file0.ts"));
    }

    #[test]
    fn test_children_indented_under_parent() {
        let mut map = make_map(1);
        let parent_id = map.symbols[0].id.clone();
        let mut child = Symbol::new("child", SymbolKind::Method, "src/file0.ts", 2);
        child.id = symbol_id("src/file0.ts", "child", 2);
        child.parent_id = Some(parent_id);
        map.symbols.push(child);

        let out = RepoFormatter::default().format(&map);
        let child_line = out.lines().find(|l| l.contains("child")).unwrap();
        assert!(child_line.starts_with("    "), "child not indented: {:?}", child_line);
    }

    #[test]
    fn test_sort_order_references_then_exported() {
        let mut map = make_map(0);
        map.files.push(FileMetadata {
            path: "src/x.ts".to_string(),
            language: crate::language::Language::TypeScript,
            lines: 5,
            symbol_count: 3,
            import_count: 0,
            export_count: 0,
            parse_success: true,
        });
        let mut hot = Symbol::new("hot", SymbolKind::Function, "src/x.ts", 1);
        hot.references = 5;
        let mut exported = Symbol::new("aaa_exported", SymbolKind::Function, "src/x.ts", 2);
        exported.exported = true;
        let cold = Symbol::new("cold", SymbolKind::Function, "src/x.ts", 3);
        map.symbols = vec![cold.clone(), exported.clone(), hot.clone()];

        let ranked = ranked_symbols(&map);
        assert_eq!(ranked[0].name, "hot");
        assert_eq!(ranked[1].name, "aaa_exported");
        assert_eq!(ranked[2].name, "cold");
    }

    proptest::proptest! {
        #[test]
        fn prop_budget_never_exceeded(symbols in 0usize..120, budget in 1usize..600) {
            let map = make_map(symbols);
            for style in [FormatStyle::Compact, FormatStyle::Detailed, FormatStyle::Tree] {
                let formatter = RepoFormatter::new(FormatOptions {
                    style,
                    max_tokens: budget,
                    group_by_file: true,
                });
                let out = formatter.format(&map);
                proptest::prop_assert!(estimate_tokens(&out) <= budget);
            }
        }
    }
}

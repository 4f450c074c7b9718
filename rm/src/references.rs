//! Cross-file reference counting and importance scoring
//!
//! Reference counts are import-driven: every `(local, original)` pair an
//! import statement carries increments every *exported* symbol whose name
//! matches. Private symbols never accumulate cross-file references.
//! Same-name symbols in different files all receive the increment;
//! disambiguation belongs to a later editing stage, not here.

use std::collections::HashMap;

use tracing::debug;

use crate::parser::ParseResult;
use crate::symbol::Symbol;

/// Damping factor for the importance fixed-point iteration.
const DAMPING: f64 = 0.85;

/// Fixed-point iterations; converges well before this at repository scale.
const ITERATIONS: usize = 20;

/// Weight of raw reference counts in the combined ranking score.
const REF_WEIGHT: f64 = 0.6;

/// Weight of the importance score in the combined ranking score.
const IMPORTANCE_WEIGHT: f64 = 0.4;

/// A symbol with its combined ranking score
#[derive(Debug, Clone)]
pub struct RankedSymbol {
    pub id: String,
    pub name: String,
    pub file: String,
    pub references: u32,
    pub importance: f64,
    pub score: f64,
}

/// Computes inbound reference counts and importance scores for symbols
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceCounter;

impl ReferenceCounter {
    pub fn new() -> Self {
        Self
    }

    /// Count inbound references and write them onto the symbols.
    ///
    /// Returns the full `symbol id -> count` map. Only exported symbols are
    /// ever incremented.
    pub fn count(&self, symbols: &mut [Symbol], results: &[ParseResult]) -> HashMap<String, u32> {
        debug!(symbols = symbols.len(), files = results.len(), "ReferenceCounter::count: called");

        // name -> indexes of exported symbols with that name
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, symbol) in symbols.iter().enumerate() {
            if symbol.exported {
                by_name.entry(symbol.name.as_str()).or_default().push(idx);
            }
        }

        let mut counts: HashMap<String, u32> = symbols.iter().map(|s| (s.id.clone(), 0)).collect();

        for result in results {
            for import in &result.imports {
                for imported in &import.symbols {
                    if let Some(indexes) = by_name.get(imported.source_name()) {
                        for &idx in indexes {
                            *counts.get_mut(&symbols[idx].id).unwrap() += 1;
                        }
                    }
                }
            }
        }

        for symbol in symbols.iter_mut() {
            symbol.references = counts.get(&symbol.id).copied().unwrap_or(0);
        }

        debug!(
            referenced = counts.values().filter(|&&c| c > 0).count(),
            "ReferenceCounter::count: complete"
        );
        counts
    }

    /// Importance scores in [0, 1] from a damped fixed-point iteration over
    /// the bipartite `files -> symbols` reference structure.
    ///
    /// File importance is each file's inbound-edge count normalized by the
    /// maximum; a symbol collects damped contributions from every file that
    /// references it, split across that file's outgoing symbol references.
    pub fn importance_scores(
        &self,
        symbols: &[Symbol],
        results: &[ParseResult],
        file_indegree: &HashMap<String, usize>,
    ) -> HashMap<String, f64> {
        debug!(symbols = symbols.len(), "ReferenceCounter::importance_scores: called");
        let n = symbols.len();
        if n == 0 {
            return HashMap::new();
        }

        let max_indegree = file_indegree.values().copied().max().unwrap_or(0).max(1) as f64;
        let file_importance: HashMap<&str, f64> = file_indegree
            .iter()
            .map(|(file, &deg)| (file.as_str(), deg as f64 / max_indegree))
            .collect();

        // per-file outgoing symbol reference totals
        let mut out_refs: HashMap<&str, usize> = HashMap::new();
        for result in results {
            let total: usize = result.imports.iter().map(|i| i.symbols.len()).sum();
            out_refs.insert(result.file.as_str(), total);
        }

        // symbol index -> referencing files
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, symbol) in symbols.iter().enumerate() {
            if symbol.exported {
                by_name.entry(symbol.name.as_str()).or_default().push(idx);
            }
        }
        let mut referencers: Vec<Vec<&str>> = vec![Vec::new(); n];
        for result in results {
            for import in &result.imports {
                for imported in &import.symbols {
                    if let Some(indexes) = by_name.get(imported.source_name()) {
                        for &idx in indexes {
                            referencers[idx].push(result.file.as_str());
                        }
                    }
                }
            }
        }

        let base = (1.0 - DAMPING) / n as f64;
        let mut scores = vec![1.0 / n as f64; n];
        for _ in 0..ITERATIONS {
            for (idx, refs) in referencers.iter().enumerate() {
                let contribution: f64 = refs
                    .iter()
                    .map(|file| {
                        let importance = file_importance.get(file).copied().unwrap_or(0.0);
                        let out = out_refs.get(file).copied().unwrap_or(0).max(1) as f64;
                        importance / out
                    })
                    .sum();
                scores[idx] = base + DAMPING * contribution;
            }
        }

        let max_score = scores.iter().cloned().fold(f64::MIN, f64::max).max(f64::MIN_POSITIVE);
        symbols
            .iter()
            .zip(scores)
            .map(|(symbol, score)| (symbol.id.clone(), score / max_score))
            .collect()
    }

    /// Symbols ranked by the combined score
    /// `0.6 * refs/max_refs + 0.4 * importance`, descending.
    pub fn ranked_symbols(
        &self,
        symbols: &[Symbol],
        importance: &HashMap<String, f64>,
    ) -> Vec<RankedSymbol> {
        let max_refs = symbols.iter().map(|s| s.references).max().unwrap_or(0).max(1) as f64;

        let mut ranked: Vec<RankedSymbol> = symbols
            .iter()
            .map(|symbol| {
                let imp = importance.get(&symbol.id).copied().unwrap_or(0.0);
                let score = REF_WEIGHT * (symbol.references as f64 / max_refs) + IMPORTANCE_WEIGHT * imp;
                RankedSymbol {
                    id: symbol.id.clone(),
                    name: symbol.name.clone(),
                    file: symbol.file.clone(),
                    references: symbol.references,
                    importance: imp,
                    score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse_all(files: &[(&str, &str)]) -> (Vec<Symbol>, Vec<ParseResult>) {
        let parser = Parser::default();
        let results: Vec<ParseResult> = files.iter().map(|(p, c)| parser.parse_file(p, c)).collect();
        let symbols: Vec<Symbol> = results.iter().flat_map(|r| r.symbols.clone()).collect();
        (symbols, results)
    }

    #[test]
    fn test_two_importers_count_two() {
        let (mut symbols, results) = parse_all(&[
            (
                "user.ts",
                "export class User {\n}\nclass User2 {\n}\n",
            ),
            ("a.ts", "import { User } from './user';\n"),
            ("b.ts", "import { User } from './user';\n"),
        ]);
        let counts = ReferenceCounter::new().count(&mut symbols, &results);
        assert_eq!(counts.get("user.ts#User#1"), Some(&2));
        assert_eq!(counts.get("user.ts#User2#3"), Some(&0));
    }

    #[test]
    fn test_private_symbols_never_counted() {
        let (mut symbols, results) = parse_all(&[
            ("secret.ts", "class User {\n}\n"),
            ("a.ts", "import { User } from './secret';\n"),
        ]);
        ReferenceCounter::new().count(&mut symbols, &results);
        for symbol in symbols.iter().filter(|s| !s.exported) {
            assert_eq!(symbol.references, 0, "private symbol {} was counted", symbol.name);
        }
    }

    #[test]
    fn test_same_name_collision_both_incremented() {
        let (mut symbols, results) = parse_all(&[
            ("one.ts", "export function parse() {\n}\n"),
            ("two.ts", "export function parse() {\n}\n"),
            ("a.ts", "import { parse } from './one';\n"),
        ]);
        let counts = ReferenceCounter::new().count(&mut symbols, &results);
        assert_eq!(counts.get("one.ts#parse#1"), Some(&1));
        assert_eq!(counts.get("two.ts#parse#1"), Some(&1));
    }

    #[test]
    fn test_aliased_import_matches_original() {
        let (mut symbols, results) = parse_all(&[
            ("user.ts", "export class User {\n}\n"),
            ("a.ts", "import { User as U } from './user';\n"),
        ]);
        let counts = ReferenceCounter::new().count(&mut symbols, &results);
        assert_eq!(counts.get("user.ts#User#1"), Some(&1));
    }

    #[test]
    fn test_importance_in_unit_range() {
        let (mut symbols, results) = parse_all(&[
            ("hub.ts", "export class Hub {\n}\nexport function spoke() {\n}\n"),
            ("a.ts", "import { Hub } from './hub';\n"),
            ("b.ts", "import { Hub, spoke } from './hub';\n"),
        ]);
        let counter = ReferenceCounter::new();
        counter.count(&mut symbols, &results);
        let indegree = HashMap::from([("hub.ts".to_string(), 2usize)]);
        let scores = counter.importance_scores(&symbols, &results, &indegree);
        for (id, score) in &scores {
            assert!((0.0..=1.0).contains(score), "{} scored {}", id, score);
        }
        // the most-referenced symbol hits the normalized ceiling
        let hub = scores.get("hub.ts#Hub#1").copied().unwrap();
        assert!((hub - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ranked_symbols_order() {
        let (mut symbols, results) = parse_all(&[
            ("hub.ts", "export class Hub {\n}\nexport function rare() {\n}\n"),
            ("a.ts", "import { Hub } from './hub';\n"),
            ("b.ts", "import { Hub } from './hub';\n"),
            ("c.ts", "import { rare } from './hub';\n"),
        ]);
        let counter = ReferenceCounter::new();
        counter.count(&mut symbols, &results);
        let indegree = HashMap::from([("hub.ts".to_string(), 3usize)]);
        let scores = counter.importance_scores(&symbols, &results, &indegree);
        let ranked = counter.ranked_symbols(&symbols, &scores);
        assert_eq!(ranked[0].name, "Hub");
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn test_empty_inputs() {
        let counter = ReferenceCounter::new();
        let mut symbols: Vec<Symbol> = vec![];
        let counts = counter.count(&mut symbols, &[]);
        assert!(counts.is_empty());
        assert!(counter.importance_scores(&symbols, &[], &HashMap::new()).is_empty());
    }
}

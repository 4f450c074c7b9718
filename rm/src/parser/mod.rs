//! Source file parsing
//!
//! Turns `(path, content)` into symbols, imports, exports, and positioned
//! parse errors. Parsing never fails at the call boundary: unsupported file
//! types and syntax damage are reported inside the [`ParseResult`], and the
//! per-file timer reports wall clock either way.

mod extract;
mod lexer;

use std::time::Instant;

use tracing::debug;

use crate::graph::normalize_path;
use crate::language::detect_language;
use crate::symbol::{ExportStatement, ImportStatement, Symbol};

/// A positioned parse-level diagnostic
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseError {
    pub message: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Everything extracted from one file
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// False when any error was recorded (unsupported type, syntax damage)
    pub success: bool,

    /// Normalized (forward-slash) file path
    pub file: String,

    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportStatement>,
    pub exports: Vec<ExportStatement>,
    pub errors: Vec<ParseError>,

    /// Wall-clock parse duration in milliseconds
    pub parse_time_ms: u64,
}

/// Parser configuration
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Attach `/** */` doc comments to the symbols they precede
    pub extract_docs: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { extract_docs: true }
    }
}

/// Extracts symbols and module statements from source files
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParserOptions,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parse a single file.
    ///
    /// Always returns a result; parse-level failures land in `errors` with
    /// `success = false`.
    pub fn parse_file(&self, path: &str, content: &str) -> ParseResult {
        let start = Instant::now();
        let file = normalize_path(path);
        debug!(%file, bytes = content.len(), "Parser::parse_file: called");

        if detect_language(path).is_none() {
            let ext = std::path::Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e))
                .unwrap_or_default();
            debug!(%file, %ext, "Parser::parse_file: unsupported extension");
            return ParseResult {
                success: false,
                file,
                symbols: vec![],
                imports: vec![],
                exports: vec![],
                errors: vec![ParseError::new(format!("Unsupported file type: {}", ext), 1, 1)],
                parse_time_ms: start.elapsed().as_millis() as u64,
            };
        }

        let lexed = lexer::lex(content);
        let mut extraction = extract::extract(&file, content, &lexed, self.options.extract_docs);

        let mut errors = lexed.errors;
        errors.append(&mut extraction.errors);
        let success = errors.is_empty();

        debug!(
            %file,
            symbols = extraction.symbols.len(),
            imports = extraction.imports.len(),
            exports = extraction.exports.len(),
            errors = errors.len(),
            "Parser::parse_file: complete"
        );

        ParseResult {
            success,
            file,
            symbols: extraction.symbols,
            imports: extraction.imports,
            exports: extraction.exports,
            errors,
            parse_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Parse many files, preserving input order.
    ///
    /// Sequential on purpose: downstream caches and indexes observe a
    /// stable symbol order.
    pub fn parse_files(&self, files: &[(String, String)]) -> Vec<ParseResult> {
        debug!(count = files.len(), "Parser::parse_files: called");
        files.iter().map(|(path, content)| self.parse_file(path, content)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{ImportKind, SymbolKind};

    fn parse(content: &str) -> ParseResult {
        Parser::default().parse_file("src/test.ts", content)
    }

    fn find<'a>(result: &'a ParseResult, name: &str) -> &'a Symbol {
        result
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {} not found in {:?}", name, result.symbols))
    }

    #[test]
    fn test_unsupported_file_type() {
        let result = Parser::default().parse_file("x.css", "body { color: red }");
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("Unsupported file type"));
    }

    #[test]
    fn test_empty_content_succeeds() {
        let result = parse("");
        assert!(result.success);
        assert!(result.symbols.is_empty());
        assert!(result.imports.is_empty());
        assert!(result.exports.is_empty());
    }

    #[test]
    fn test_class_with_members() {
        let src = "export class User {\n  name: string;\n  greet(): string {\n    return this.name;\n  }\n}\n";
        let result = parse(src);
        assert!(result.success);

        let class = find(&result, "User");
        assert_eq!(class.kind, SymbolKind::Class);
        assert!(class.exported);
        assert_eq!(class.line, 1);
        assert_eq!(class.end_line, 6);

        let prop = find(&result, "name");
        assert_eq!(prop.kind, SymbolKind::Property);
        assert_eq!(prop.parent_id.as_deref(), Some(class.id.as_str()));

        let method = find(&result, "greet");
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.parent_id.as_deref(), Some(class.id.as_str()));
    }

    #[test]
    fn test_method_body_contents_not_extracted() {
        let src = "class C {\n  run() {\n    const inner = 1;\n    if (inner) {\n    }\n  }\n}\n";
        let result = parse(src);
        assert!(result.symbols.iter().all(|s| s.name != "inner"));
        assert!(result.symbols.iter().all(|s| s.name != "if"));
    }

    #[test]
    fn test_interface_members() {
        let src = "interface Shape {\n  area(): number;\n  sides: number;\n}\n";
        let result = parse(src);
        let iface = find(&result, "Shape");
        assert_eq!(iface.kind, SymbolKind::Interface);
        assert!(!iface.exported);
        assert_eq!(find(&result, "area").kind, SymbolKind::Method);
        assert_eq!(find(&result, "sides").kind, SymbolKind::Property);
    }

    #[test]
    fn test_arrow_const_lifted_to_function() {
        let src = "export const handler = async (req: Request) => {\n  return null;\n};\nconst LIMIT = 10;\nlet counter = 0;\n";
        let result = parse(src);
        assert_eq!(find(&result, "handler").kind, SymbolKind::Function);
        assert!(find(&result, "handler").exported);
        assert_eq!(find(&result, "LIMIT").kind, SymbolKind::Constant);
        assert_eq!(find(&result, "counter").kind, SymbolKind::Variable);
    }

    #[test]
    fn test_function_expression_lifted() {
        let result = parse("const legacy = function (a) { return a; };\n");
        assert_eq!(find(&result, "legacy").kind, SymbolKind::Function);
    }

    #[test]
    fn test_enum_and_members() {
        let src = "export enum Color {\n  Red,\n  Green = 2,\n}\n";
        let result = parse(src);
        let color = find(&result, "Color");
        assert_eq!(color.kind, SymbolKind::Enum);
        let red = find(&result, "Red");
        assert_eq!(red.kind, SymbolKind::EnumMember);
        assert_eq!(red.parent_id.as_deref(), Some(color.id.as_str()));
        assert_eq!(find(&result, "Green").kind, SymbolKind::EnumMember);
    }

    #[test]
    fn test_type_alias_and_namespace() {
        let src = "export type UserId = string;\nnamespace Internal {\n  export function helper() {\n  }\n}\n";
        let result = parse(src);
        assert_eq!(find(&result, "UserId").kind, SymbolKind::Type);
        let ns = find(&result, "Internal");
        assert_eq!(ns.kind, SymbolKind::Namespace);
        let helper = find(&result, "helper");
        assert_eq!(helper.kind, SymbolKind::Function);
        assert_eq!(helper.parent_id.as_deref(), Some(ns.id.as_str()));
    }

    #[test]
    fn test_doc_comment_attached() {
        let src = "/**\n * Greets the user.\n * @returns a greeting\n */\nexport function greet() {\n}\n";
        let result = parse(src);
        let greet = find(&result, "greet");
        assert_eq!(greet.doc.as_deref(), Some("Greets the user."));
    }

    #[test]
    fn test_doc_extraction_disabled() {
        let parser = Parser::new(ParserOptions { extract_docs: false });
        let src = "/** Doc. */\nexport function f() {\n}\n";
        let result = parser.parse_file("a.ts", src);
        assert!(result.symbols[0].doc.is_none());
    }

    #[test]
    fn test_import_forms() {
        let src = concat!(
            "import Default from './default';\n",
            "import * as ns from './namespace';\n",
            "import { a, b as c } from './named';\n",
            "import './side';\n",
            "import type { T } from './types';\n",
            "const fs = require('fs');\n",
            "const lazy = await import('./lazy');\n",
        );
        let result = parse(src);
        assert_eq!(result.imports.len(), 7);

        assert_eq!(result.imports[0].kind, ImportKind::Default);
        assert_eq!(result.imports[0].symbols[0].local, "Default");

        assert_eq!(result.imports[1].kind, ImportKind::Namespace);
        assert_eq!(result.imports[2].kind, ImportKind::Named);
        assert_eq!(result.imports[2].symbols[1].local, "c");
        assert_eq!(result.imports[2].symbols[1].original.as_deref(), Some("b"));

        assert_eq!(result.imports[3].kind, ImportKind::SideEffect);
        assert!(result.imports[3].symbols.is_empty());

        assert!(result.imports[4].type_only);

        assert_eq!(result.imports[5].kind, ImportKind::Require);
        assert_eq!(result.imports[5].source, "fs");

        assert_eq!(result.imports[6].kind, ImportKind::Dynamic);
        assert_eq!(result.imports[6].source, "./lazy");
    }

    #[test]
    fn test_export_forms() {
        let src = concat!(
            "export { a } from './re';\n",
            "export * from './all';\n",
            "function local() {\n}\n",
            "export { local };\n",
        );
        let result = parse(src);
        assert_eq!(result.exports.len(), 3);
        assert_eq!(result.exports[0].kind, ImportKind::ReExport);
        assert_eq!(result.exports[1].kind, ImportKind::All);
        assert_eq!(result.exports[2].kind, ImportKind::Named);

        // export list marks the local symbol
        assert!(find(&result, "local").exported);
    }

    #[test]
    fn test_unbalanced_braces_reported() {
        let result = parse("class Broken {\n  run() {\n}\n");
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.message.contains("Unbalanced braces")));
    }

    #[test]
    fn test_idempotent_symbols() {
        let src = "export class A {\n  go() {\n  }\n}\nexport const B = 1;\n";
        let first = parse(src);
        let second = parse(src);
        let ids1: Vec<_> = first.symbols.iter().map(|s| &s.id).collect();
        let ids2: Vec<_> = second.symbols.iter().map(|s| &s.id).collect();
        assert_eq!(ids1, ids2);
    }

    #[test]
    fn test_parse_files_preserves_order() {
        let files = vec![
            ("b.ts".to_string(), "export const b = 1;\n".to_string()),
            ("a.ts".to_string(), "export const a = 1;\n".to_string()),
        ];
        let results = Parser::default().parse_files(&files);
        assert_eq!(results[0].file, "b.ts");
        assert_eq!(results[1].file, "a.ts");
    }

    #[test]
    fn test_modifiers_collected() {
        let src = "export abstract class Base {\n  private static counter: number = 0;\n  protected async run(): Promise<void> {\n  }\n}\n";
        let result = parse(src);
        assert!(find(&result, "Base").modifiers.contains(&"abstract".to_string()));
        let counter = find(&result, "counter");
        assert!(counter.modifiers.contains(&"private".to_string()));
        assert!(counter.modifiers.contains(&"static".to_string()));
        let run = find(&result, "run");
        assert!(run.modifiers.contains(&"protected".to_string()));
        assert!(run.modifiers.contains(&"async".to_string()));
    }

    #[test]
    fn test_backslash_paths_normalized() {
        let result = Parser::default().parse_file("src\\win\\file.ts", "export const x = 1;\n");
        assert_eq!(result.file, "src/win/file.ts");
        assert!(result.symbols[0].id.starts_with("src/win/file.ts#"));
    }
}

//! Declaration and import extraction
//!
//! Walks the lexed projections line by line, tracking brace depth so that
//! class/interface members and enum members are attributed to their
//! enclosing symbol. Declarations are matched against the `structure`
//! projection (literal interiors blanked); import and export statements are
//! matched against the `code` projection because module specifiers are
//! string literals.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::ParseError;
use super::lexer::Lexed;
use crate::symbol::{ExportStatement, ImportKind, ImportStatement, ImportedSymbol, Symbol, SymbolKind};

static RE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap()
});
static RE_INTERFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?interface\s+([A-Za-z_$][\w$]*)").unwrap());
static RE_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)")
        .unwrap()
});
static RE_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?type\s+([A-Za-z_$][\w$]*)[^=]*=").unwrap());
static RE_ENUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)").unwrap());
static RE_NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?(namespace|module)\s+([A-Za-z_$][\w$.]*)").unwrap()
});
static RE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?(const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]*?)?=(.*)$").unwrap()
});
static RE_ARROW_INIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=>]*)?=>|[A-Za-z_$][\w$]*\s*=>)").unwrap()
});
static RE_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*((?:(?:public|private|protected|static|readonly|abstract|async|override|get|set)\s+)*)\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(",
    )
    .unwrap()
});
static RE_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*((?:(?:public|private|protected|static|readonly|abstract|declare|override)\s+)*)([A-Za-z_$][\w$]*)\s*[?!]?\s*[:=]",
    )
    .unwrap()
});
static RE_ENUM_MEMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_$][\w$]*)\s*(?:=[^,]*)?,?\s*$").unwrap());

static RE_IMPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s+(type\s+)?(.+?)\s+from\s+['"]([^'"]+)['"]"#).unwrap()
});
static RE_IMPORT_SIDE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^\s*import\s+['"]([^'"]+)['"]"#).unwrap());
static RE_IMPORT_DYNAMIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
static RE_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:const|let|var)\s+(?:\{([^}]*)\}|([A-Za-z_$][\w$]*))\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#)
        .unwrap()
});
static RE_EXPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*export\s+(type\s+)?(?:\*(?:\s+as\s+([A-Za-z_$][\w$]*))?|\{([^}]*)\})\s+from\s+['"]([^'"]+)['"]"#)
        .unwrap()
});
static RE_EXPORT_NAMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*export\s+(type\s+)?\{([^}]*)\}\s*;?\s*$").unwrap());
static RE_EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*export\s+default\s+([A-Za-z_$][\w$]*)?\s*;?\s*$").unwrap());

const MODIFIER_KEYWORDS: &[&str] = &[
    "abstract", "async", "static", "readonly", "public", "private", "protected", "declare", "default", "const", "get",
    "set", "override",
];

/// Keywords that look like call expressions to the method regex.
const NON_METHOD_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "typeof", "await", "function", "import", "export",
    "else", "do", "throw", "super",
];

/// What the scanner extracted from one file
#[derive(Debug, Default)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportStatement>,
    pub exports: Vec<ExportStatement>,
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Class,
    Interface,
    Enum,
    Namespace,
    /// Function bodies are tracked for depth/end-line only; nothing inside
    /// them is extracted
    Opaque,
}

#[derive(Debug)]
struct Container {
    sym_idx: usize,
    body_depth: i32,
    kind: ContainerKind,
}

pub fn extract(file: &str, original: &str, lexed: &Lexed, extract_docs: bool) -> Extraction {
    let mut out = Extraction::default();

    let structure_lines: Vec<&str> = lexed.structure.lines().collect();
    let code_lines: Vec<&str> = lexed.code.lines().collect();
    let original_lines: Vec<&str> = original.lines().collect();

    let mut depth: i32 = 0;
    let mut containers: Vec<Container> = Vec::new();
    let mut open_brace_lines: Vec<u32> = Vec::new();
    let mut underflow_reported = false;

    for (idx, sline) in structure_lines.iter().enumerate() {
        let line_no = (idx + 1) as u32;
        let cline = code_lines.get(idx).copied().unwrap_or("");
        let oline = original_lines.get(idx).copied().unwrap_or("");

        extract_module_statements(cline, line_no, &mut out);

        // Declaration matching happens against the depth at line start; the
        // innermost container is active when the body depth equals it.
        let pending = match active_context(&containers, depth) {
            Some(ContainerKind::Class) | Some(ContainerKind::Interface) => {
                match_member(sline, oline, line_no, &containers, &mut out);
                None
            }
            Some(ContainerKind::Enum) => {
                match_enum_member(sline, oline, line_no, &containers, &mut out);
                None
            }
            Some(ContainerKind::Opaque) => None,
            Some(ContainerKind::Namespace) | None => match_declaration(
                file,
                sline,
                oline,
                line_no,
                &containers,
                extract_docs.then_some((&lexed.docs, structure_lines.as_slice())),
                &mut out,
            ),
        };

        // Walk the braces to keep depth current; the first `{` after a
        // container declaration opens its body.
        let mut pending = pending;
        for ch in sline.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    open_brace_lines.push(line_no);
                    if let Some((sym_idx, kind)) = pending.take() {
                        containers.push(Container {
                            sym_idx,
                            body_depth: depth,
                            kind,
                        });
                    }
                }
                '}' => {
                    if depth == 0 {
                        if !underflow_reported {
                            out.errors.push(ParseError::new("Unexpected '}'", line_no, 1));
                            underflow_reported = true;
                        }
                    } else {
                        depth -= 1;
                        open_brace_lines.pop();
                        while containers.last().map(|c| c.body_depth > depth).unwrap_or(false) {
                            let closed = containers.pop().unwrap();
                            out.symbols[closed.sym_idx].end_line = line_no;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(open_line) = open_brace_lines.last() {
        out.errors.push(ParseError::new("Unbalanced braces", *open_line, 1));
    }

    // Close any container the brace walk left open (unbalanced input)
    let last_line = structure_lines.len() as u32;
    while let Some(closed) = containers.pop() {
        out.symbols[closed.sym_idx].end_line = last_line;
    }

    mark_named_exports(&mut out);
    out
}

/// The innermost container whose body we are directly inside, if any.
fn active_context(containers: &[Container], depth: i32) -> Option<ContainerKind> {
    containers.last().map(|c| {
        if c.body_depth == depth {
            c.kind
        } else {
            // deeper than the innermost body (method bodies, block scopes):
            // nothing in there is extracted
            ContainerKind::Opaque
        }
    })
}

fn parent_id(containers: &[Container], out: &Extraction) -> Option<String> {
    containers.last().map(|c| out.symbols[c.sym_idx].id.clone())
}

/// Match a top-level (or namespace-level) declaration. Returns the pending
/// container handle when the declaration opens a tracked body.
fn match_declaration(
    file: &str,
    sline: &str,
    oline: &str,
    line_no: u32,
    containers: &[Container],
    docs: Option<(&HashMap<u32, String>, &[&str])>,
    out: &mut Extraction,
) -> Option<(usize, ContainerKind)> {
    let parent = parent_id(containers, out);
    let exported = is_exported(sline);

    let (name, kind, container) = if let Some(caps) = RE_CLASS.captures(sline) {
        (caps.get(1).unwrap(), SymbolKind::Class, Some(ContainerKind::Class))
    } else if let Some(caps) = RE_INTERFACE.captures(sline) {
        (caps.get(1).unwrap(), SymbolKind::Interface, Some(ContainerKind::Interface))
    } else if let Some(caps) = RE_FUNCTION.captures(sline) {
        (caps.get(1).unwrap(), SymbolKind::Function, Some(ContainerKind::Opaque))
    } else if let Some(caps) = RE_ENUM.captures(sline) {
        (caps.get(1).unwrap(), SymbolKind::Enum, Some(ContainerKind::Enum))
    } else if let Some(caps) = RE_NAMESPACE.captures(sline) {
        let kind = if caps.get(1).unwrap().as_str() == "module" {
            SymbolKind::Module
        } else {
            SymbolKind::Namespace
        };
        (caps.get(2).unwrap(), kind, Some(ContainerKind::Namespace))
    } else if let Some(caps) = RE_TYPE.captures(sline) {
        (caps.get(1).unwrap(), SymbolKind::Type, None)
    } else if let Some(caps) = RE_VAR.captures(sline) {
        let keyword = caps.get(1).unwrap().as_str();
        let initializer = caps.get(3).unwrap().as_str();
        let kind = if is_function_initializer(initializer) {
            SymbolKind::Function
        } else if keyword == "const" {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };
        // lifted function bodies are tracked so their locals stay out of
        // the symbol table
        let container = (kind == SymbolKind::Function).then_some(ContainerKind::Opaque);
        (caps.get(2).unwrap(), kind, container)
    } else {
        return None;
    };

    let mut symbol = Symbol::new(name.as_str(), kind, file, line_no);
    symbol.column = (name.start() + 1) as u32;
    symbol.signature = oline.trim().to_string();
    symbol.exported = exported;
    symbol.parent_id = parent;
    symbol.modifiers = collect_modifiers(&sline[..name.start()]);
    if let Some((docs, structure_lines)) = docs {
        symbol.doc = find_doc(docs, structure_lines, line_no);
    }

    out.symbols.push(symbol);
    let sym_idx = out.symbols.len() - 1;
    container.map(|c| (sym_idx, c))
}

fn match_member(sline: &str, oline: &str, line_no: u32, containers: &[Container], out: &mut Extraction) {
    let parent = parent_id(containers, out);

    if let Some(caps) = RE_METHOD.captures(sline) {
        let name = caps.get(2).unwrap();
        if !NON_METHOD_KEYWORDS.contains(&name.as_str()) {
            let container_idx = containers.last().unwrap().sym_idx;
            let file = out.symbols[container_idx].file.clone();
            let mut symbol = Symbol::new(name.as_str(), SymbolKind::Method, file, line_no);
            symbol.column = (name.start() + 1) as u32;
            symbol.signature = oline.trim().to_string();
            symbol.parent_id = parent;
            symbol.modifiers = collect_modifiers(caps.get(1).unwrap().as_str());
            out.symbols.push(symbol);
            return;
        }
    }

    if let Some(caps) = RE_PROPERTY.captures(sline) {
        let name = caps.get(2).unwrap();
        if MODIFIER_KEYWORDS.contains(&name.as_str()) {
            return;
        }
        let container_idx = containers.last().unwrap().sym_idx;
        let file = out.symbols[container_idx].file.clone();
        let mut symbol = Symbol::new(name.as_str(), SymbolKind::Property, file, line_no);
        symbol.column = (name.start() + 1) as u32;
        symbol.signature = oline.trim().to_string();
        symbol.parent_id = parent;
        symbol.modifiers = collect_modifiers(caps.get(1).unwrap().as_str());
        out.symbols.push(symbol);
    }
}

fn match_enum_member(sline: &str, oline: &str, line_no: u32, containers: &[Container], out: &mut Extraction) {
    if let Some(caps) = RE_ENUM_MEMBER.captures(sline) {
        let name = caps.get(1).unwrap();
        let container_idx = containers.last().unwrap().sym_idx;
        let file = out.symbols[container_idx].file.clone();
        let parent = parent_id(containers, out);
        let mut symbol = Symbol::new(name.as_str(), SymbolKind::EnumMember, file, line_no);
        symbol.column = (name.start() + 1) as u32;
        symbol.signature = oline.trim().to_string();
        symbol.parent_id = parent;
        out.symbols.push(symbol);
    }
}

/// Match import/export statements and dynamic/require forms on one line.
fn extract_module_statements(cline: &str, line_no: u32, out: &mut Extraction) {
    if let Some(caps) = RE_IMPORT_FROM.captures(cline) {
        let type_only = caps.get(1).is_some();
        let clause = caps.get(2).unwrap().as_str().trim();
        let source = caps.get(3).unwrap().as_str().to_string();
        let (kind, symbols) = parse_import_clause(clause);
        out.imports.push(ImportStatement {
            source,
            symbols,
            kind,
            line: line_no,
            type_only,
        });
        return;
    }

    if let Some(caps) = RE_IMPORT_SIDE.captures(cline) {
        out.imports.push(ImportStatement {
            source: caps.get(1).unwrap().as_str().to_string(),
            symbols: vec![],
            kind: ImportKind::SideEffect,
            line: line_no,
            type_only: false,
        });
        return;
    }

    if let Some(caps) = RE_EXPORT_FROM.captures(cline) {
        let type_only = caps.get(1).is_some();
        let source = caps.get(4).unwrap().as_str().to_string();
        if let Some(inner) = caps.get(3) {
            out.exports.push(ExportStatement {
                source: Some(source),
                symbols: parse_specifiers(inner.as_str()),
                kind: ImportKind::ReExport,
                line: line_no,
                type_only,
            });
        } else {
            let symbols = caps.get(2).map(|ns| vec![ImportedSymbol::plain(ns.as_str())]).unwrap_or_default();
            out.exports.push(ExportStatement {
                source: Some(source),
                symbols,
                kind: ImportKind::All,
                line: line_no,
                type_only,
            });
        }
        return;
    }

    if let Some(caps) = RE_EXPORT_NAMED.captures(cline) {
        out.exports.push(ExportStatement {
            source: None,
            symbols: parse_specifiers(caps.get(2).unwrap().as_str()),
            kind: ImportKind::Named,
            line: line_no,
            type_only: caps.get(1).is_some(),
        });
        return;
    }

    if let Some(caps) = RE_EXPORT_DEFAULT.captures(cline) {
        let symbols = caps.get(1).map(|name| vec![ImportedSymbol::plain(name.as_str())]).unwrap_or_default();
        out.exports.push(ExportStatement {
            source: None,
            symbols,
            kind: ImportKind::Default,
            line: line_no,
            type_only: false,
        });
        return;
    }

    if let Some(caps) = RE_REQUIRE.captures(cline) {
        let symbols = if let Some(inner) = caps.get(1) {
            parse_specifiers(inner.as_str())
        } else {
            vec![ImportedSymbol::plain(caps.get(2).unwrap().as_str())]
        };
        out.imports.push(ImportStatement {
            source: caps.get(3).unwrap().as_str().to_string(),
            symbols,
            kind: ImportKind::Require,
            line: line_no,
            type_only: false,
        });
        return;
    }

    if let Some(caps) = RE_IMPORT_DYNAMIC.captures(cline) {
        out.imports.push(ImportStatement {
            source: caps.get(1).unwrap().as_str().to_string(),
            symbols: vec![],
            kind: ImportKind::Dynamic,
            line: line_no,
            type_only: false,
        });
    }
}

/// Parse the clause between `import` and `from`.
fn parse_import_clause(clause: &str) -> (ImportKind, Vec<ImportedSymbol>) {
    if let Some(rest) = clause.strip_prefix('{') {
        let inner = rest.strip_suffix('}').unwrap_or(rest);
        return (ImportKind::Named, parse_specifiers(inner));
    }

    if let Some(rest) = clause.strip_prefix('*') {
        let name = rest.trim().strip_prefix("as").map(|n| n.trim()).unwrap_or("");
        let symbols = if name.is_empty() {
            vec![]
        } else {
            vec![ImportedSymbol::plain(name)]
        };
        return (ImportKind::Namespace, symbols);
    }

    // default import, possibly mixed with a named or namespace clause
    let mut symbols = Vec::new();
    let mut parts = clause.splitn(2, ',');
    if let Some(default_name) = parts.next() {
        let default_name = default_name.trim();
        if !default_name.is_empty() {
            symbols.push(ImportedSymbol::plain(default_name));
        }
    }
    if let Some(rest) = parts.next() {
        let rest = rest.trim();
        if let Some(inner) = rest.strip_prefix('{') {
            let inner = inner.strip_suffix('}').unwrap_or(inner);
            symbols.extend(parse_specifiers(inner));
        } else if let Some(ns) = rest.strip_prefix("* as") {
            symbols.push(ImportedSymbol::plain(ns.trim()));
        }
    }
    (ImportKind::Default, symbols)
}

/// Parse a `{ a, b as c, type D }` specifier list (braces already removed).
fn parse_specifiers(inner: &str) -> Vec<ImportedSymbol> {
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let s = s.strip_prefix("type ").map(str::trim).unwrap_or(s);
            match s.split_once(" as ") {
                Some((original, local)) => ImportedSymbol::aliased(original.trim(), local.trim()),
                None => ImportedSymbol::plain(s),
            }
        })
        .collect()
}

/// Mark symbols named by local `export { ... }` lists as exported.
fn mark_named_exports(out: &mut Extraction) {
    let mut names: Vec<String> = Vec::new();
    for export in &out.exports {
        if export.source.is_none() && matches!(export.kind, ImportKind::Named | ImportKind::Default) {
            for sym in &export.symbols {
                names.push(sym.source_name().to_string());
            }
        }
    }
    for symbol in &mut out.symbols {
        if symbol.is_top_level() && names.iter().any(|n| n == &symbol.name) {
            symbol.exported = true;
        }
    }
}

fn is_exported(sline: &str) -> bool {
    let trimmed = sline.trim_start();
    trimmed == "export" || trimmed.starts_with("export ")
}

/// Whether a declarator initializer is an arrow function or function
/// expression, lifting the declarator to a function symbol.
fn is_function_initializer(initializer: &str) -> bool {
    RE_ARROW_INIT.is_match(initializer.trim_start())
}

fn collect_modifiers(prefix: &str) -> Vec<String> {
    prefix
        .split_whitespace()
        .filter(|word| MODIFIER_KEYWORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Find the doc comment attached to a declaration: the `/** */` block that
/// closes on the nearest preceding non-blank line.
fn find_doc(docs: &HashMap<u32, String>, structure_lines: &[&str], decl_line: u32) -> Option<String> {
    let mut line = decl_line.checked_sub(1)?;
    while line >= 1 {
        if let Some(doc) = docs.get(&line) {
            return Some(doc.clone());
        }
        let content = structure_lines.get((line - 1) as usize)?;
        if !content.trim().is_empty() {
            return None;
        }
        line -= 1;
    }
    None
}

//! Symbol and import/export statement types
//!
//! These are the value types the parser emits and everything downstream
//! (graph, reference counter, formatter) consumes.

use serde::{Deserialize, Serialize};

/// Kind of a named entity extracted from source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Interface,
    Function,
    Method,
    Property,
    Variable,
    Constant,
    Type,
    Enum,
    EnumMember,
    Namespace,
    Module,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Type => "type",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumMember => "enum_member",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Module => "module",
        };
        write!(f, "{}", s)
    }
}

/// Build the identity of a symbol from its defining coordinates.
///
/// The triple `(file, name, line)` is unique within one repo map; two
/// symbols may share a name across files (or even within a file at
/// different lines) and remain distinct.
pub fn symbol_id(file: &str, name: &str, line: u32) -> String {
    format!("{}#{}#{}", file, name, line)
}

/// A named entity extracted from a source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Identity derived from `(file, name, line)`
    pub id: String,

    /// Declared name
    pub name: String,

    /// Entity kind
    pub kind: SymbolKind,

    /// Normalized path of the defining file
    pub file: String,

    /// 1-based line of the declaration
    pub line: u32,

    /// 1-based line where the declaration body ends
    pub end_line: u32,

    /// 1-based column of the declared name
    pub column: u32,

    /// Type signature as written (declaration line, trimmed)
    pub signature: String,

    /// Doc comment, if a `/** */` block immediately precedes the declaration
    pub doc: Option<String>,

    /// Whether the symbol is exported from its module
    pub exported: bool,

    /// Enclosing symbol id for class/interface members and enum members
    pub parent_id: Option<String>,

    /// Leading modifier keywords (export excluded): abstract, async, static,
    /// readonly, accessibility, etc.
    pub modifiers: Vec<String>,

    /// Inbound reference count; populated by the reference counter, only
    /// ever non-zero for exported symbols
    pub references: u32,
}

impl Symbol {
    /// Create a symbol with identity derived from its coordinates.
    pub fn new(name: impl Into<String>, kind: SymbolKind, file: impl Into<String>, line: u32) -> Self {
        let name = name.into();
        let file = file.into();
        Self {
            id: symbol_id(&file, &name, line),
            name,
            kind,
            file,
            line,
            end_line: line,
            column: 1,
            signature: String::new(),
            doc: None,
            exported: false,
            parent_id: None,
            modifiers: Vec::new(),
            references: 0,
        }
    }

    /// Whether this symbol is declared at module top level (no parent).
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// How an import (or re-export) binds its source module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import { a, b as c } from 's'`
    Named,
    /// `import X from 's'`
    Default,
    /// `import * as X from 's'`
    Namespace,
    /// `import 's'`
    SideEffect,
    /// `import('s')`
    Dynamic,
    /// `const x = require('s')`
    Require,
    /// `export { a } from 's'`
    ReExport,
    /// `export * from 's'`
    All,
}

/// One symbol bound by an import or export clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedSymbol {
    /// Name the binding is visible under locally
    pub local: String,

    /// Original name in the source module when aliased (`b as c` gives
    /// local `c`, original `b`); `None` when unaliased
    pub original: Option<String>,
}

impl ImportedSymbol {
    pub fn plain(local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            original: None,
        }
    }

    pub fn aliased(original: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            original: Some(original.into()),
        }
    }

    /// The name to match against exported symbols: original when present,
    /// local otherwise.
    pub fn source_name(&self) -> &str {
        self.original.as_deref().unwrap_or(&self.local)
    }
}

/// A single import statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStatement {
    /// Module specifier as written (`./user`, `@scope/pkg`, `react`)
    pub source: String,

    /// Symbols bound by the clause; empty for side-effect and dynamic forms
    pub symbols: Vec<ImportedSymbol>,

    /// Statement form
    pub kind: ImportKind,

    /// 1-based line of the statement
    pub line: u32,

    /// Whether the statement is type-only (`import type`)
    pub type_only: bool,
}

/// A single export statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStatement {
    /// Source module for re-export forms; `None` for local exports
    pub source: Option<String>,

    /// Symbols named by the clause; empty for `export *`
    pub symbols: Vec<ImportedSymbol>,

    /// Statement form (Named for `export { a }`, ReExport/All when a
    /// source module is present, Default for `export default`)
    pub kind: ImportKind,

    /// 1-based line of the statement
    pub line: u32,

    /// Whether the statement is type-only (`export type`)
    pub type_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_id_format() {
        assert_eq!(symbol_id("src/user.ts", "User", 5), "src/user.ts#User#5");
    }

    #[test]
    fn test_symbol_id_uniqueness_by_line() {
        let a = Symbol::new("User", SymbolKind::Class, "src/user.ts", 5);
        let b = Symbol::new("User", SymbolKind::Interface, "src/user.ts", 40);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_imported_symbol_source_name() {
        assert_eq!(ImportedSymbol::plain("User").source_name(), "User");
        assert_eq!(ImportedSymbol::aliased("User", "U").source_name(), "User");
    }

    #[test]
    fn test_new_symbol_defaults() {
        let s = Symbol::new("run", SymbolKind::Function, "src/run.ts", 12);
        assert!(!s.exported);
        assert!(s.is_top_level());
        assert_eq!(s.references, 0);
        assert_eq!(s.end_line, 12);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SymbolKind::EnumMember.to_string(), "enum_member");
        assert_eq!(SymbolKind::Class.to_string(), "class");
    }
}

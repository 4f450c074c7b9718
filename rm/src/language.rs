//! Source language detection
//!
//! Language is decided purely from the file extension. Anything outside the
//! known set is rejected up front by the parser with a structured error
//! rather than a guess.

use std::path::Path;

/// Extensions the analysis pipeline accepts as parseable source.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// A supported source language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
}

impl Language {
    /// Whether the language carries type-level syntax (interfaces, type
    /// aliases, type-only imports).
    pub fn is_typed(&self) -> bool {
        matches!(self, Language::TypeScript | Language::Tsx)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::TypeScript => write!(f, "typescript"),
            Language::Tsx => write!(f, "tsx"),
            Language::JavaScript => write!(f, "javascript"),
            Language::Jsx => write!(f, "jsx"),
        }
    }
}

/// Detect the language of a file from its extension.
///
/// Pure lookup; returns `None` for unsupported or missing extensions.
pub fn detect_language(path: impl AsRef<Path>) -> Option<Language> {
    let ext = path.as_ref().extension()?.to_str()?;
    match ext {
        "ts" | "mts" | "cts" => Some(Language::TypeScript),
        "tsx" => Some(Language::Tsx),
        "js" | "mjs" | "cjs" => Some(Language::JavaScript),
        "jsx" => Some(Language::Jsx),
        _ => None,
    }
}

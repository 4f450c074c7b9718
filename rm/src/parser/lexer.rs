//! Comment and string lexing pass
//!
//! The declaration scanner works over a structurally faithful copy of the
//! source where comment and literal interiors are blanked out (newlines
//! preserved), so brace depth and declaration keywords can be read without
//! tripping over `class` inside a string or a brace inside a comment.
//!
//! Two projections come out of the single pass:
//! - `code`: comments blanked, string literals preserved. Import and export
//!   extraction runs here because module specifiers are string literals.
//! - `structure`: comments and string/template interiors blanked. Depth
//!   tracking and declaration matching run here.
//!
//! Doc comments (`/** */`) are captured on the way through, keyed by the
//! line on which the comment closes.

use std::collections::HashMap;

use super::ParseError;

/// Output of the lexing pass
#[derive(Debug)]
pub struct Lexed {
    /// Comments blanked, strings preserved
    pub code: String,

    /// Comments and literal interiors blanked
    pub structure: String,

    /// Doc comment text keyed by the 1-based line the comment closes on
    pub docs: HashMap<u32, String>,

    /// Unterminated comment/string diagnostics
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    LineComment,
    BlockComment,
    Single,
    Double,
    Template,
}

/// Run the lexing pass over a whole file.
pub fn lex(content: &str) -> Lexed {
    let mut code = String::with_capacity(content.len());
    let mut structure = String::with_capacity(content.len());
    let mut docs = HashMap::new();
    let mut errors = Vec::new();

    let mut state = State::Normal;
    let mut line: u32 = 1;
    let mut open_line: u32 = 1;
    let mut doc_buf: Option<String> = None;
    // Depth of `${ }` interpolations nested inside the current template
    let mut template_interp: u32 = 0;

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();

        match state {
            State::Normal => match c {
                '/' if next == Some('/') => {
                    state = State::LineComment;
                    code.push(' ');
                    structure.push(' ');
                }
                '/' if next == Some('*') => {
                    state = State::BlockComment;
                    open_line = line;
                    chars.next();
                    code.push_str("  ");
                    structure.push_str("  ");
                    // a third char of '*' marks a doc comment
                    if chars.peek() == Some(&'*') {
                        doc_buf = Some(String::new());
                    }
                }
                '\'' => {
                    state = State::Single;
                    open_line = line;
                    code.push(c);
                    structure.push(c);
                }
                '"' => {
                    state = State::Double;
                    open_line = line;
                    code.push(c);
                    structure.push(c);
                }
                '`' => {
                    state = State::Template;
                    open_line = line;
                    template_interp = 0;
                    code.push(c);
                    structure.push(c);
                }
                '\n' => {
                    line += 1;
                    code.push('\n');
                    structure.push('\n');
                }
                _ => {
                    code.push(c);
                    structure.push(c);
                }
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                    line += 1;
                    code.push('\n');
                    structure.push('\n');
                } else {
                    code.push(' ');
                    structure.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    chars.next();
                    code.push_str("  ");
                    structure.push_str("  ");
                    state = State::Normal;
                    if let Some(buf) = doc_buf.take()
                        && let Some(text) = clean_doc(&buf)
                    {
                        docs.insert(line, text);
                    }
                } else {
                    if let Some(buf) = doc_buf.as_mut() {
                        buf.push(c);
                    }
                    if c == '\n' {
                        line += 1;
                        code.push('\n');
                        structure.push('\n');
                    } else {
                        code.push(' ');
                        structure.push(' ');
                    }
                }
            }
            State::Single | State::Double => {
                let quote = if state == State::Single { '\'' } else { '"' };
                match c {
                    '\\' => {
                        code.push(c);
                        structure.push(' ');
                        if let Some(escaped) = chars.next() {
                            code.push(escaped);
                            structure.push(' ');
                            if escaped == '\n' {
                                line += 1;
                            }
                        }
                    }
                    '\n' => {
                        // plain strings do not span lines
                        errors.push(ParseError::new("Unterminated string literal", open_line, 1));
                        state = State::Normal;
                        line += 1;
                        code.push('\n');
                        structure.push('\n');
                    }
                    _ if c == quote => {
                        state = State::Normal;
                        code.push(c);
                        structure.push(c);
                    }
                    _ => {
                        code.push(c);
                        structure.push(' ');
                    }
                }
            }
            State::Template => match c {
                '\\' => {
                    code.push(c);
                    structure.push(' ');
                    if let Some(escaped) = chars.next() {
                        code.push(escaped);
                        structure.push(' ');
                        if escaped == '\n' {
                            line += 1;
                        }
                    }
                }
                '$' if next == Some('{') => {
                    // interpolation interiors stay blanked; tracking depth
                    // keeps the closing backtick honest
                    chars.next();
                    template_interp += 1;
                    code.push_str("${");
                    structure.push_str("  ");
                }
                '}' if template_interp > 0 => {
                    template_interp -= 1;
                    code.push(c);
                    structure.push(' ');
                }
                '`' => {
                    state = State::Normal;
                    code.push(c);
                    structure.push(c);
                }
                '\n' => {
                    line += 1;
                    code.push('\n');
                    structure.push('\n');
                }
                _ => {
                    code.push(c);
                    structure.push(' ');
                }
            },
        }
    }

    match state {
        State::BlockComment => {
            errors.push(ParseError::new("Unterminated block comment", open_line, 1));
        }
        State::Single | State::Double => {
            errors.push(ParseError::new("Unterminated string literal", open_line, 1));
        }
        State::Template => {
            errors.push(ParseError::new("Unterminated template literal", open_line, 1));
        }
        _ => {}
    }

    Lexed {
        code,
        structure,
        docs,
        errors,
    }
}

/// Strip doc-comment furniture: leading `*` gutters, `@tag` lines, blank
/// padding. Returns `None` when nothing readable remains.
fn clean_doc(raw: &str) -> Option<String> {
    let cleaned: Vec<&str> = raw
        .lines()
        .map(|l| {
            let t = l.trim_start();
            let t = t.strip_prefix('*').unwrap_or(t);
            t.trim()
        })
        .filter(|l| !l.is_empty() && !l.starts_with('@'))
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_comment_blanked_in_both() {
        let lexed = lex("let a = 1; // class Fake {\nlet b = 2;\n");
        assert!(!lexed.code.contains("class Fake"));
        assert!(!lexed.structure.contains("class Fake"));
        assert!(lexed.code.contains("let b = 2;"));
        assert!(lexed.errors.is_empty());
    }

    #[test]
    fn test_strings_kept_in_code_blanked_in_structure() {
        let lexed = lex("import x from './mod';\nconst s = 'class Fake {';\n");
        assert!(lexed.code.contains("'./mod'"));
        assert!(lexed.code.contains("class Fake"));
        assert!(!lexed.structure.contains("class Fake"));
        // quotes survive in structure so strings still read as atoms
        assert!(lexed.structure.contains('\''));
    }

    #[test]
    fn test_template_interpolation_brace_not_counted() {
        let lexed = lex("const t = `a ${b} c { unbalanced`;\n");
        assert!(!lexed.structure.contains('{'));
        assert!(lexed.errors.is_empty());
    }

    #[test]
    fn test_doc_comment_captured_and_cleaned() {
        let src = "/**\n * Does the thing.\n * @param x unused\n */\nfunction f() {}\n";
        let lexed = lex(src);
        // the comment closes on line 4
        assert_eq!(lexed.docs.get(&4).map(String::as_str), Some("Does the thing."));
    }

    #[test]
    fn test_plain_block_comment_not_a_doc() {
        let lexed = lex("/* not a doc */\nfunction f() {}\n");
        assert!(lexed.docs.is_empty());
    }

    #[test]
    fn test_unterminated_block_comment_flagged() {
        let lexed = lex("let a = 1;\n/* runs off the end\nlet b = 2;\n");
        assert_eq!(lexed.errors.len(), 1);
        assert!(lexed.errors[0].message.contains("Unterminated block comment"));
        assert_eq!(lexed.errors[0].line, 2);
    }

    #[test]
    fn test_unterminated_string_flagged() {
        let lexed = lex("const s = 'oops\n");
        assert!(lexed.errors.iter().any(|e| e.message.contains("string")));
    }

    #[test]
    fn test_newlines_preserved() {
        let src = "a\nb\nc\n";
        let lexed = lex(src);
        assert_eq!(lexed.code.lines().count(), 3);
        assert_eq!(lexed.structure.lines().count(), 3);
    }
}

use thiserror::Error;

/// A syntax error collected while tokenizing or parsing a formula.
///
/// Mirrors the source's collecting error listener: the formula name and
/// original source text are always attached so the host can report a
/// useful diagnostic, and line/column are filled in when the lexer can
/// determine them.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("parsing error in '{formula_name}' at {line}:{column}: {message}\n  source: {source_text}")]
pub struct ParsingError {
    /// Name of the formula (variable or function header) being parsed.
    pub formula_name: String,
    /// First error message collected.
    pub message: String,
    /// 1-based line number, when known.
    pub line: usize,
    /// 1-based column number, when known.
    pub column: usize,
    /// The original formula source text.
    pub source_text: String,
}

impl ParsingError {
    /// Construct a parsing error at the given line/column.
    pub fn new(
        formula_name: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        column: usize,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            formula_name: formula_name.into(),
            message: message.into(),
            line,
            column,
            source_text: source_text.into(),
        }
    }
}

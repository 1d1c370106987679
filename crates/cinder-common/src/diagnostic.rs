use crate::source::SourceMap;
use crate::token::Token;
use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Coarse error taxonomy, stable across crates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unexpected token, missing semicolon, unbalanced bracket.
    Syntax,
    /// Missing identifier, ambiguous call, undefined namespace, incomplete type.
    Resolution,
    /// Type mismatch, invalid conversion, invalid operand.
    Type,
    /// Deduction failure, constraint not satisfied, instantiation failure.
    Template,
    /// Invariant violation; fatal.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "error",
            ErrorKind::Resolution => "resolution error",
            ErrorKind::Type => "type error",
            ErrorKind::Template => "template error",
            ErrorKind::Internal => "internal error",
        }
    }
}

/// An error produced by parsing or lowering, anchored to a token.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub token: Token,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, token: Token) -> Self {
        Self {
            kind,
            message: message.into(),
            token,
        }
    }

    /// `<file>:<line>:<col>: <kind>: <message>`
    pub fn render(&self, sources: &SourceMap) -> String {
        format!(
            "{}:{}:{}: {}: {}",
            sources.name(self.token.file),
            self.token.line,
            self.token.column,
            self.kind.as_str(),
            self.message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

/// Driver-facing diagnostic, rendered through miette at end of compilation.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
#[error("{message}")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[help]
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            help: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolInterner;
    use crate::token::TokenKind;

    #[test]
    fn render_includes_position_and_kind() {
        let mut interner = SymbolInterner::new();
        let mut sources = SourceMap::new();
        let file = sources.add_file("widget.cpp");
        let tok = Token::new(TokenKind::Identifier, interner.intern("frob"), file, 12, 7);
        let err = CompileError::new(ErrorKind::Resolution, "use of undeclared identifier 'frob'", tok);
        assert_eq!(
            err.render(&sources),
            "widget.cpp:12:7: resolution error: use of undeclared identifier 'frob'"
        );
    }
}

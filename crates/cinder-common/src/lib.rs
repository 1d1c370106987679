mod diagnostic;
mod source;
mod symbol;
mod token;

pub use diagnostic::{CompileError, Diagnostic, DiagnosticLevel, ErrorKind};
pub use source::{SourceId, SourceMap};
pub use symbol::{Symbol, SymbolInterner};
pub use token::{SavePoint, Token, TokenKind, TokenStream};

//! Reference lexer.
//!
//! The core consumes a token stream from a lexer collaborator; this one
//! exists so the driver and the test suites can start from source text. It
//! is deliberately not a preprocessor: no macro expansion, no includes.

use cinder_common::{SourceId, Symbol, SymbolInterner, Token, TokenKind, TokenStream};

const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "auto", "bool", "break", "case", "catch", "char", "class", "concept",
    "const", "consteval", "constexpr", "constinit", "const_cast", "continue", "decltype",
    "default", "delete", "do", "double", "dynamic_cast", "else", "enum", "explicit", "extern",
    "false", "float", "for", "friend", "goto", "if", "inline", "int", "long", "mutable",
    "namespace", "new", "noexcept", "nullptr", "operator", "private", "protected", "public",
    "register", "reinterpret_cast", "requires", "return", "short", "signed", "sizeof", "static",
    "static_assert", "static_cast", "struct", "switch", "template", "this", "throw", "true",
    "try", "typedef", "typeid", "typename", "union", "unsigned", "using", "virtual", "void",
    "volatile", "wchar_t", "while",
];

// Longest first so maximal munch falls out of the scan order.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "<=>", "...", "->*", "::", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=",
    "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", ".*", "+", "-", "*", "/", "%",
    "<", ">", "=", "!", "&", "|", "^", "~", "?", ":", ".", ",",
];

const PUNCTUATORS: &[char] = &['(', ')', '{', '}', '[', ']', ';', '#'];

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    file: SourceId,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s.as_bytes())
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if (c as char).is_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    while self.pos < self.src.len() && !self.starts_with("*/") {
                        self.bump();
                    }
                    self.bump();
                    self.bump();
                }
                _ => break,
            }
        }
    }

    /// Consume a quoted literal including escapes; returns the raw lexeme.
    fn quoted(&mut self, quote: u8, start: usize) -> &'a [u8] {
        self.bump(); // opening quote
        while let Some(c) = self.peek() {
            if c == b'\\' {
                self.bump();
                self.bump();
                continue;
            }
            if c == quote {
                self.bump();
                break;
            }
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn number(&mut self, start: usize) -> (&'a [u8], bool) {
        let mut is_float = false;
        if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X') | Some(b'b') | Some(b'B'))
        {
            self.bump();
            self.bump();
            while matches!(self.peek(), Some(c) if (c as char).is_ascii_alphanumeric()) {
                self.bump();
            }
            return (&self.src[start..self.pos], false);
        }
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' | b'\'' => {
                    self.bump();
                }
                b'.' if !is_float && matches!(self.peek_at(1), Some(b'0'..=b'9')) => {
                    is_float = true;
                    self.bump();
                }
                b'e' | b'E'
                    if matches!(self.peek_at(1), Some(b'0'..=b'9') | Some(b'+') | Some(b'-')) =>
                {
                    is_float = true;
                    self.bump();
                    self.bump();
                }
                _ => break,
            }
        }
        // Suffixes: u/U, l/L, ll/LL, f/F (f forces float).
        while let Some(c) = self.peek() {
            match c {
                b'u' | b'U' | b'l' | b'L' => {
                    self.bump();
                }
                b'f' | b'F' => {
                    is_float = true;
                    self.bump();
                }
                _ => break,
            }
        }
        (&self.src[start..self.pos], is_float)
    }
}

/// Lex one translation unit into a token stream ending in `Eof`.
pub fn tokenize(source: &str, file: SourceId, interner: &mut SymbolInterner) -> TokenStream {
    let mut lexer = Lexer {
        src: source.as_bytes(),
        pos: 0,
        line: 1,
        column: 1,
        file,
    };
    let mut tokens = Vec::new();

    loop {
        lexer.skip_trivia();
        let (line, column, start) = (lexer.line, lexer.column, lexer.pos);
        let Some(c) = lexer.peek() else { break };

        let (kind, sym): (TokenKind, Symbol) = if c == b'"' {
            let lexeme = lexer.quoted(b'"', start);
            (TokenKind::StringLiteral, intern_bytes(interner, lexeme))
        } else if c == b'\'' {
            let lexeme = lexer.quoted(b'\'', start);
            (TokenKind::CharLiteral, intern_bytes(interner, lexeme))
        } else if c.is_ascii_digit()
            || (c == b'.' && matches!(lexer.peek_at(1), Some(b'0'..=b'9')))
        {
            let (lexeme, is_float) = lexer.number(start);
            let kind = if is_float {
                TokenKind::FloatLiteral
            } else {
                TokenKind::IntegerLiteral
            };
            (kind, intern_bytes(interner, lexeme))
        } else if c.is_ascii_alphabetic() || c == b'_' {
            // Identifier, keyword, or an encoding-prefixed literal.
            let mut end = lexer.pos;
            while matches!(
                lexer.src.get(end),
                Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
            ) {
                end += 1;
            }
            let word = &source[start..end];
            let prefix_ok = matches!(word, "L" | "u" | "U" | "u8");
            match lexer.src.get(end) {
                Some(b'"') if prefix_ok => {
                    lexer.pos = end;
                    lexer.column += (end - start) as u32;
                    let lexeme = lexer.quoted(b'"', start);
                    (TokenKind::StringLiteral, intern_bytes(interner, lexeme))
                }
                Some(b'\'') if prefix_ok => {
                    lexer.pos = end;
                    lexer.column += (end - start) as u32;
                    let lexeme = lexer.quoted(b'\'', start);
                    (TokenKind::CharLiteral, intern_bytes(interner, lexeme))
                }
                _ => {
                    lexer.pos = end;
                    lexer.column += (end - start) as u32;
                    let kind = if KEYWORDS.contains(&word) {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Identifier
                    };
                    (kind, interner.intern(word))
                }
            }
        } else if PUNCTUATORS.contains(&(c as char)) {
            lexer.bump();
            (TokenKind::Punctuator, interner.intern(&source[start..start + 1]))
        } else if let Some(op) = OPERATORS.iter().find(|op| lexer.starts_with(op)) {
            for _ in 0..op.len() {
                lexer.bump();
            }
            (TokenKind::Operator, interner.intern(op))
        } else {
            // Unknown byte: emit it as a punctuator and keep going; the
            // parser reports the position.
            lexer.bump();
            (
                TokenKind::Punctuator,
                interner.intern(&source[start..lexer.pos]),
            )
        };

        tokens.push(Token::new(kind, sym, file, line, column));
    }

    let eof = interner.intern("<eof>");
    tokens.push(Token::new(
        TokenKind::Eof,
        eof,
        file,
        lexer.line,
        lexer.column,
    ));
    TokenStream::new(tokens)
}

fn intern_bytes(interner: &mut SymbolInterner, bytes: &[u8]) -> Symbol {
    interner.intern(std::str::from_utf8(bytes).unwrap_or(""))
}

/// Decode the raw lexeme of an integer literal: value plus suffix type info.
pub fn integer_literal_parts(lexeme: &str) -> (u64, bool, u32) {
    let lower = lexeme.to_ascii_lowercase();
    let digits_end = lower
        .char_indices()
        .rev()
        .find(|(_, c)| !matches!(c, 'u' | 'l'))
        .map(|(i, _)| i + 1)
        .unwrap_or(lower.len());
    let (digits, suffix) = lower.split_at(digits_end);
    let digits: String = digits.chars().filter(|c| *c != '\'').collect();
    let value = if let Some(hex) = digits.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).unwrap_or(0)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).unwrap_or(0)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).unwrap_or(0)
    } else {
        digits.parse().unwrap_or(0)
    };
    let is_unsigned = suffix.contains('u');
    let long_count = suffix.matches('l').count() as u32;
    (value, is_unsigned, long_count)
}

/// Decode a float literal lexeme: value plus whether the `f` suffix applied.
pub fn float_literal_parts(lexeme: &str) -> (f64, bool) {
    let lower = lexeme.to_ascii_lowercase();
    let is_single = lower.ends_with('f');
    let digits = lower.trim_end_matches(['f', 'l']);
    (digits.parse().unwrap_or(0.0), is_single)
}

/// Decode a character or string literal: (encoding prefix, unescaped body).
pub fn decode_quoted(lexeme: &str) -> (&str, String) {
    let (prefix, rest) = if let Some(r) = lexeme.strip_prefix("u8") {
        ("u8", r)
    } else if let Some(r) = lexeme.strip_prefix('L') {
        ("L", r)
    } else if let Some(r) = lexeme.strip_prefix('u') {
        ("u", r)
    } else if let Some(r) = lexeme.strip_prefix('U') {
        ("U", r)
    } else {
        ("", lexeme)
    };
    let body = rest
        .strip_prefix(['"', '\''])
        .and_then(|s| s.strip_suffix(['"', '\'']))
        .unwrap_or(rest);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('x') => {
                let hex: String = chars.clone().take_while(|c| c.is_ascii_hexdigit()).collect();
                for _ in 0..hex.len() {
                    chars.next();
                }
                if let Ok(v) = u32::from_str_radix(&hex, 16) {
                    out.push(char::from_u32(v).unwrap_or('\0'));
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    (prefix, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::SourceMap;

    fn lex(src: &str) -> (Vec<(TokenKind, String)>, SymbolInterner) {
        let mut interner = SymbolInterner::new();
        let mut sources = SourceMap::new();
        let file = sources.add_file("lex.cpp");
        let mut stream = tokenize(src, file, &mut interner);
        let mut out = Vec::new();
        while !stream.at_eof() {
            let t = stream.advance();
            out.push((t.kind, interner.view(t.value).to_string()));
        }
        (out, interner)
    }

    #[test]
    fn operators_take_maximal_munch() {
        let (tokens, _) = lex("a <<= b <=> c->*d");
        let lexemes: Vec<&str> = tokens.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(lexemes, vec!["a", "<<=", "b", "<=>", "c", "->*", "d"]);
    }

    #[test]
    fn keywords_are_distinguished_from_identifiers() {
        let (tokens, _) = lex("int intx");
        assert_eq!(tokens[0].0, TokenKind::Keyword);
        assert_eq!(tokens[1].0, TokenKind::Identifier);
        assert_eq!(tokens[1].1, "intx");
    }

    #[test]
    fn numeric_literals_keep_suffixes() {
        let (tokens, _) = lex("42ull 0x1F 1.5f 2e10 0b101");
        assert_eq!(tokens[0], (TokenKind::IntegerLiteral, "42ull".to_string()));
        assert_eq!(tokens[1], (TokenKind::IntegerLiteral, "0x1F".to_string()));
        assert_eq!(tokens[2], (TokenKind::FloatLiteral, "1.5f".to_string()));
        assert_eq!(tokens[3], (TokenKind::FloatLiteral, "2e10".to_string()));
        assert_eq!(tokens[4], (TokenKind::IntegerLiteral, "0b101".to_string()));
    }

    #[test]
    fn encoding_prefixes_attach_to_literals() {
        let (tokens, _) = lex(r#"L"wide" u8"narrow" U'c' plain"#);
        assert_eq!(tokens[0], (TokenKind::StringLiteral, "L\"wide\"".to_string()));
        assert_eq!(tokens[1], (TokenKind::StringLiteral, "u8\"narrow\"".to_string()));
        assert_eq!(tokens[2], (TokenKind::CharLiteral, "U'c'".to_string()));
        assert_eq!(tokens[3].0, TokenKind::Identifier);
    }

    #[test]
    fn comments_are_trivia() {
        let (tokens, _) = lex("a /* gone */ b // tail\nc");
        let lexemes: Vec<&str> = tokens.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(lexemes, vec!["a", "b", "c"]);
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let mut interner = SymbolInterner::new();
        let mut sources = SourceMap::new();
        let file = sources.add_file("pos.cpp");
        let mut stream = tokenize("int x;\n  y = 1;", file, &mut interner);
        let int_tok = stream.advance();
        assert_eq!((int_tok.line, int_tok.column), (1, 1));
        stream.advance(); // x
        stream.advance(); // ;
        let y_tok = stream.advance();
        assert_eq!((y_tok.line, y_tok.column), (2, 3));
    }

    #[test]
    fn integer_parts_handle_bases_and_suffixes() {
        assert_eq!(integer_literal_parts("42"), (42, false, 0));
        assert_eq!(integer_literal_parts("0x1F"), (31, false, 0));
        assert_eq!(integer_literal_parts("42ull"), (42, true, 2));
        assert_eq!(integer_literal_parts("010"), (8, false, 0));
        assert_eq!(integer_literal_parts("1'000'000"), (1_000_000, false, 0));
    }

    #[test]
    fn quoted_decoding_processes_escapes() {
        let (prefix, body) = decode_quoted(r#"L"a\nb""#);
        assert_eq!(prefix, "L");
        assert_eq!(body, "a\nb");
        let (prefix, body) = decode_quoted(r"'\x41'");
        assert_eq!(prefix, "");
        assert_eq!(body, "A");
    }
}

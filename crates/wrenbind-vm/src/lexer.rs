//! Lexer for the script language.
//!
//! Identifiers and punctuation are recognized by a logos-generated DFA.
//! Whitespace, comments, numbers and string literals (which may contain
//! nested `%(...)` interpolations) are scanned by hand in [`Lexer::tokenize`].

use crate::token::{InterpPart, Span, Token};
use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
enum LogosToken {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token("...")]
    DotDotDot,
    #[token("?")]
    Question,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("|")]
    Pipe,
    #[token("||")]
    PipePipe,
    #[token("&&")]
    AmpAmp,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedCharacter { char: char, span: Span },
    UnterminatedString { span: Span },
    UnterminatedComment { span: Span },
    InvalidNumber { text: String, span: Span },
    InvalidEscape { escape: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> &Span {
        match self {
            LexError::UnexpectedCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span }
            | LexError::InvalidNumber { span, .. }
            | LexError::InvalidEscape { span, .. } => span,
        }
    }

    pub fn description(&self) -> String {
        match self {
            LexError::UnexpectedCharacter { char, .. } => {
                format!("Unexpected character '{}'", char)
            }
            LexError::UnterminatedString { .. } => "Unterminated string".to_string(),
            LexError::UnterminatedComment { .. } => "Unterminated block comment".to_string(),
            LexError::InvalidNumber { text, .. } => format!("Invalid number '{}'", text),
            LexError::InvalidEscape { escape, .. } => {
                format!("Invalid escape sequence '{}'", escape)
            }
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[line {}] {}", self.span().line, self.description())
    }
}

impl std::error::Error for LexError {}

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
    /// Line number of the first source line (non-1 for interpolated code)
    first_line: u32,
    tokens: Vec<(Token, Span)>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::starting_at(source, 1)
    }

    /// Lexer for a source fragment that begins at `line` of an enclosing file.
    pub fn starting_at(source: &'a str, line: u32) -> Self {
        Self {
            source,
            first_line: line,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(Token, Span)>, Vec<LexError>> {
        let bytes = self.source.as_bytes();
        let mut pos = 0;
        let mut line = self.first_line;
        let mut column = 1u32;

        while pos < bytes.len() {
            match bytes[pos] {
                b' ' | b'\t' | b'\r' => {
                    pos += 1;
                    column += 1;
                    continue;
                }
                b'\n' => {
                    if !matches!(self.tokens.last(), Some((Token::Newline, _)) | None) {
                        self.tokens
                            .push((Token::Newline, Span::new(pos, pos + 1, line, column)));
                    }
                    pos += 1;
                    line += 1;
                    column = 1;
                    continue;
                }
                b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                    while pos < bytes.len() && bytes[pos] != b'\n' {
                        pos += 1;
                    }
                    continue;
                }
                b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                    let start = Span::new(pos, pos + 2, line, column);
                    let mut depth = 0usize;
                    loop {
                        if pos >= bytes.len() {
                            self.errors.push(LexError::UnterminatedComment { span: start });
                            break;
                        }
                        if bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'*') {
                            depth += 1;
                            pos += 2;
                            column += 2;
                        } else if bytes[pos] == b'*' && bytes.get(pos + 1) == Some(&b'/') {
                            depth -= 1;
                            pos += 2;
                            column += 2;
                            if depth == 0 {
                                break;
                            }
                        } else {
                            if bytes[pos] == b'\n' {
                                line += 1;
                                column = 1;
                            } else {
                                column += 1;
                            }
                            pos += 1;
                        }
                    }
                    continue;
                }
                b'"' => {
                    let start_line = line;
                    let start_column = column;
                    match self.lex_string(pos, line) {
                        Ok((token, end, end_line, end_column)) => {
                            self.tokens
                                .push((token, Span::new(pos, end, start_line, start_column)));
                            if end_line == start_line {
                                column = start_column + (end - pos) as u32;
                            } else {
                                column = end_column;
                            }
                            line = end_line;
                            pos = end;
                        }
                        Err(err) => {
                            self.errors.push(err);
                            break;
                        }
                    }
                    continue;
                }
                b'0'..=b'9' => {
                    let end = scan_number(bytes, pos);
                    let text = &self.source[pos..end];
                    let span = Span::new(pos, end, line, column);
                    match parse_number(text) {
                        Some(n) => self.tokens.push((Token::Number(n), span)),
                        None => self.errors.push(LexError::InvalidNumber {
                            text: text.to_string(),
                            span,
                        }),
                    }
                    column += (end - pos) as u32;
                    pos = end;
                    continue;
                }
                _ => {}
            }

            let mut logos_lexer = LogosToken::lexer(&self.source[pos..]);
            let Some(result) = logos_lexer.next() else {
                break;
            };
            let range = logos_lexer.span();
            let abs_start = pos + range.start;
            let abs_end = pos + range.end;
            let span = Span::new(abs_start, abs_end, line, column);

            match result {
                Ok(LogosToken::Ident) => {
                    let text = &self.source[abs_start..abs_end];
                    self.tokens.push((classify_name(text), span));
                }
                Ok(other) => self.tokens.push((convert_punct(other), span)),
                Err(_) => {
                    let char = self.source[abs_start..].chars().next().unwrap_or('\0');
                    self.errors.push(LexError::UnexpectedCharacter { char, span });
                }
            }

            column += self.source[abs_start..abs_end].chars().count() as u32;
            pos = abs_end.max(pos + 1);
        }

        let eof = Span::new(self.source.len(), self.source.len(), line, column);
        self.tokens.push((Token::Eof, eof));

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    /// Scan a string literal starting at the opening quote.
    ///
    /// Returns the token, the byte offset after the closing quote and the
    /// line/column reached.
    fn lex_string(
        &self,
        start: usize,
        start_line: u32,
    ) -> Result<(Token, usize, u32, u32), LexError> {
        let source = self.source;
        let mut parts: Vec<InterpPart> = Vec::new();
        let mut text = String::new();
        let mut pos = start + 1;
        let mut line = start_line;
        let mut column = 1u32;

        loop {
            let Some(ch) = source[pos..].chars().next() else {
                return Err(LexError::UnterminatedString {
                    span: Span::new(start, source.len(), start_line, 0),
                });
            };
            match ch {
                '"' => {
                    pos += 1;
                    break;
                }
                '\\' => {
                    let esc_start = pos;
                    pos += 1;
                    let Some(esc) = source[pos..].chars().next() else {
                        continue;
                    };
                    pos += esc.len_utf8();
                    match esc {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        '0' => text.push('\0'),
                        '"' => text.push('"'),
                        '\\' => text.push('\\'),
                        '%' => text.push('%'),
                        'x' | 'u' => {
                            let digits = if esc == 'x' { 2 } else { 4 };
                            let hex = source.get(pos..pos + digits).unwrap_or("");
                            match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                                Some(c) if hex.len() == digits => {
                                    text.push(c);
                                    pos += digits;
                                }
                                _ => {
                                    return Err(LexError::InvalidEscape {
                                        escape: source[esc_start..pos].to_string(),
                                        span: Span::new(esc_start, pos, line, column),
                                    })
                                }
                            }
                        }
                        other => {
                            return Err(LexError::InvalidEscape {
                                escape: format!("\\{}", other),
                                span: Span::new(esc_start, pos, line, column),
                            })
                        }
                    }
                }
                '%' if source[pos + 1..].starts_with('(') => {
                    if !text.is_empty() {
                        parts.push(InterpPart::Text(std::mem::take(&mut text)));
                    }
                    let code_start = pos + 2;
                    let code_line = line;
                    let code_end = find_interpolation_end(source, code_start).ok_or(
                        LexError::UnterminatedString {
                            span: Span::new(start, source.len(), start_line, 0),
                        },
                    )?;
                    let code = &source[code_start..code_end];
                    line += code.matches('\n').count() as u32;
                    parts.push(InterpPart::Code {
                        source: code.to_string(),
                        line: code_line,
                    });
                    pos = code_end + 1;
                }
                '\n' => {
                    text.push('\n');
                    pos += 1;
                    line += 1;
                    column = 1;
                }
                other => {
                    text.push(other);
                    pos += other.len_utf8();
                    column += 1;
                }
            }
        }

        let token = if parts.is_empty() {
            Token::Str(text)
        } else {
            if !text.is_empty() {
                parts.push(InterpPart::Text(text));
            }
            Token::Interpolated(parts)
        };
        Ok((token, pos, line, column))
    }
}

/// Find the `)` closing an interpolation whose code starts at `start`.
fn find_interpolation_end(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 1usize;
    let mut pos = start;
    let mut in_string = false;
    while pos < bytes.len() {
        let b = bytes[pos];
        if in_string {
            match b {
                b'\\' => pos += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos);
                    }
                }
                _ => {}
            }
        }
        pos += 1;
    }
    None
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    if bytes[pos] == b'0' && matches!(bytes.get(pos + 1), Some(b'x') | Some(b'X')) {
        pos += 2;
        while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
            pos += 1;
        }
        return pos;
    }
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    // A fraction needs a digit after the dot, otherwise `1..2` would break.
    if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

fn parse_number(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    text.parse::<f64>().ok()
}

fn classify_name(text: &str) -> Token {
    if let Some(keyword) = Token::keyword(text) {
        keyword
    } else if text.starts_with("__") {
        Token::StaticField(text.to_string())
    } else if text.starts_with('_') {
        Token::Field(text.to_string())
    } else {
        Token::Ident(text.to_string())
    }
}

fn convert_punct(token: LogosToken) -> Token {
    match token {
        LogosToken::Ident => unreachable!("identifiers are classified separately"),
        LogosToken::LeftParen => Token::LeftParen,
        LogosToken::RightParen => Token::RightParen,
        LogosToken::LeftBracket => Token::LeftBracket,
        LogosToken::RightBracket => Token::RightBracket,
        LogosToken::LeftBrace => Token::LeftBrace,
        LogosToken::RightBrace => Token::RightBrace,
        LogosToken::Colon => Token::Colon,
        LogosToken::Comma => Token::Comma,
        LogosToken::Dot => Token::Dot,
        LogosToken::DotDot => Token::DotDot,
        LogosToken::DotDotDot => Token::DotDotDot,
        LogosToken::Question => Token::Question,
        LogosToken::Plus => Token::Plus,
        LogosToken::Minus => Token::Minus,
        LogosToken::Star => Token::Star,
        LogosToken::Slash => Token::Slash,
        LogosToken::Percent => Token::Percent,
        LogosToken::Bang => Token::Bang,
        LogosToken::Tilde => Token::Tilde,
        LogosToken::Pipe => Token::Pipe,
        LogosToken::PipePipe => Token::PipePipe,
        LogosToken::AmpAmp => Token::AmpAmp,
        LogosToken::Eq => Token::Eq,
        LogosToken::EqEq => Token::EqEq,
        LogosToken::BangEq => Token::BangEq,
        LogosToken::Lt => Token::Lt,
        LogosToken::Gt => Token::Gt,
        LogosToken::LtEq => Token::LtEq,
        LogosToken::GtEq => Token::GtEq,
    }
}

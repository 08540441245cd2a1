//! Token definitions for the script language.
//!
//! Newlines are significant (they terminate statements), so they are kept
//! in the token stream as [`Token::Newline`].

use std::fmt;

/// A token of the script language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    As,
    Break,
    Class,
    Construct,
    Continue,
    Else,
    False,
    For,
    Foreign,
    If,
    Import,
    In,
    Is,
    Null,
    Return,
    Static,
    This,
    True,
    Var,
    While,

    // Names
    Ident(String),
    /// Instance field, `_name`
    Field(String),
    /// Static field, `__name`
    StaticField(String),

    // Literals
    Number(f64),
    Str(String),
    /// String containing `%(expr)` interpolations
    Interpolated(Vec<InterpPart>),

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Colon,
    Comma,
    Dot,
    DotDot,
    DotDotDot,
    Question,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Tilde,
    Pipe,
    PipePipe,
    AmpAmp,
    Eq,
    EqEq,
    BangEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    Newline,
    Eof,
}

/// One piece of an interpolated string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Text(String),
    /// Raw source of an embedded expression and the line it starts on
    Code { source: String, line: u32 },
}

/// Source location of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

impl Token {
    /// Map an identifier to its keyword token, if it is one.
    pub fn keyword(name: &str) -> Option<Token> {
        let token = match name {
            "as" => Token::As,
            "break" => Token::Break,
            "class" => Token::Class,
            "construct" => Token::Construct,
            "continue" => Token::Continue,
            "else" => Token::Else,
            "false" => Token::False,
            "for" => Token::For,
            "foreign" => Token::Foreign,
            "if" => Token::If,
            "import" => Token::Import,
            "in" => Token::In,
            "is" => Token::Is,
            "null" => Token::Null,
            "return" => Token::Return,
            "static" => Token::Static,
            "this" => Token::This,
            "true" => Token::True,
            "var" => Token::Var,
            "while" => Token::While,
            _ => return None,
        };
        Some(token)
    }

    /// Operator text when this token can name an operator method.
    pub fn operator_name(&self) -> Option<&'static str> {
        let name = match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::Tilde => "~",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::DotDot => "..",
            Token::DotDotDot => "...",
            Token::Is => "is",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) | Token::Field(name) | Token::StaticField(name) => {
                write!(f, "{}", name)
            }
            Token::Number(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Interpolated(_) => write!(f, "interpolated string"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Question => write!(f, "?"),
            Token::Pipe => write!(f, "|"),
            Token::PipePipe => write!(f, "||"),
            Token::AmpAmp => write!(f, "&&"),
            Token::Eq => write!(f, "="),
            Token::Newline => write!(f, "newline"),
            Token::Eof => write!(f, "end of file"),
            other => match other.operator_name() {
                Some(op) => write!(f, "{}", op),
                None => write!(f, "{}", format!("{:?}", other).to_lowercase()),
            },
        }
    }
}

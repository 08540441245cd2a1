//! Recursive descent parser.
//!
//! Transforms the token stream from the lexer into statements. Newlines
//! terminate statements, so the parser skips them explicitly wherever the
//! grammar allows a line break (after operators, commas and opening
//! delimiters, and before a `.` that continues a call chain).

pub mod error;
pub mod expr;
pub mod stmt;

use crate::ast::Stmt;
use crate::lexer::Lexer;
use crate::token::{Span, Token};

pub use error::ParseError;

/// Maximum nesting depth of expressions and blocks.
pub(crate) const MAX_PARSE_DEPTH: usize = 256;

/// Parser state.
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    pub(crate) depth: usize,
}

impl Parser {
    /// Create a parser for a complete module source.
    pub fn new(source: &str) -> Result<Self, Vec<ParseError>> {
        Self::starting_at(source, 1)
    }

    /// Create a parser for a source fragment beginning at `line`.
    pub fn starting_at(source: &str, line: u32) -> Result<Self, Vec<ParseError>> {
        let tokens = Lexer::starting_at(source, line)
            .tokenize()
            .map_err(|errors| errors.into_iter().map(ParseError::from).collect::<Vec<_>>())?;
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
        })
    }

    /// Parse the whole token stream as a module body.
    ///
    /// Parsing stops at the first error; scripts are small and a cascade of
    /// follow-up errors is rarely useful.
    pub fn parse(mut self) -> Result<Vec<Stmt>, Vec<ParseError>> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            let statement = stmt::parse_statement(&mut self)
                .and_then(|statement| stmt::end_statement(&mut self).map(|_| statement));
            match statement {
                Ok(statement) => statements.push(statement),
                Err(err) => return Err(vec![err]),
            }
            self.skip_newlines();
        }
        Ok(statements)
    }

    // ========================================================================
    // Token Management
    // ========================================================================

    #[inline]
    pub fn current(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    #[inline]
    pub fn current_span(&self) -> Span {
        self.tokens[self.pos].1
    }

    #[inline]
    pub fn current_line(&self) -> u32 {
        self.tokens[self.pos].1.line
    }

    /// Token after the current one.
    pub fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|(token, _)| token)
            .unwrap_or(&Token::Eof)
    }

    /// First token after any run of newlines starting at the current token.
    pub fn peek_past_newlines(&self) -> &Token {
        let mut pos = self.pos;
        while let Some((Token::Newline, _)) = self.tokens.get(pos) {
            pos += 1;
        }
        self.tokens
            .get(pos)
            .map(|(token, _)| token)
            .unwrap_or(&Token::Eof)
    }

    pub fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    #[inline]
    pub fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(expected)
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn at_eof(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    pub fn expect(&mut self, expected: Token, what: &str) -> Result<Token, ParseError> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub fn skip_newlines(&mut self) {
        while matches!(self.current(), Token::Newline) {
            self.advance();
        }
    }

    pub fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::unexpected(expected, self.current(), self.current_span())
    }

    pub(crate) fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            return Err(ParseError::new(
                format!("Maximum nesting depth ({}) exceeded.", MAX_PARSE_DEPTH),
                self.current_span(),
            ));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// Parse a complete module source.
pub fn parse_module(source: &str) -> Result<Vec<Stmt>, Vec<ParseError>> {
    Parser::new(source)?.parse()
}

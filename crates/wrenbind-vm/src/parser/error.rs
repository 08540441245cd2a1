//! Parse error type

use crate::lexer::LexError;
use crate::token::{Span, Token};
use std::fmt;

/// A parse error with location information.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// Text of the offending token, when there is one
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            found: None,
        }
    }

    pub fn unexpected(expected: &str, found: &Token, span: Span) -> Self {
        Self {
            message: format!("Expected {}.", expected),
            span,
            found: Some(found.to_string()),
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.description(), *err.span())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            Some(found) => write!(
                f,
                "[line {}] Error at '{}': {}",
                self.span.line, found, self.message
            ),
            None => write!(f, "[line {}] Error: {}", self.span.line, self.message),
        }
    }
}

impl std::error::Error for ParseError {}

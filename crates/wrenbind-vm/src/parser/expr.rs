//! Expression parsing

use std::rc::Rc;

use super::{stmt, ParseError, Parser};
use crate::ast::{Expr, FnDecl, InterpSegment, Stmt, StmtKind};
use crate::token::{InterpPart, Token};

/// Parse an expression.
pub fn parse_expression(parser: &mut Parser) -> Result<Expr, ParseError> {
    parser.enter()?;
    let result = parse_assignment(parser);
    parser.leave();
    result
}

fn parse_assignment(parser: &mut Parser) -> Result<Expr, ParseError> {
    let target = parse_conditional(parser)?;
    if !parser.check(&Token::Eq) {
        return Ok(target);
    }
    let span = parser.current_span();
    parser.advance();
    parser.skip_newlines();
    let value = Box::new(parse_expression(parser)?);

    match target {
        Expr::Var(name) => Ok(Expr::Assign {
            target: name,
            value,
        }),
        Expr::Field(field) => Ok(Expr::FieldAssign {
            field,
            is_static: false,
            value,
        }),
        Expr::StaticField(field) => Ok(Expr::FieldAssign {
            field,
            is_static: true,
            value,
        }),
        Expr::Call {
            receiver: Some(receiver),
            name,
            args: None,
        } => Ok(Expr::Setter {
            receiver,
            name,
            value,
        }),
        Expr::Subscript { receiver, args } => Ok(Expr::SubscriptSet {
            receiver,
            args,
            value,
        }),
        _ => Err(ParseError::new("Invalid assignment target.", span)),
    }
}

fn parse_conditional(parser: &mut Parser) -> Result<Expr, ParseError> {
    let cond = parse_or(parser)?;
    if !parser.eat(&Token::Question) {
        return Ok(cond);
    }
    parser.skip_newlines();
    let then_expr = parse_expression(parser)?;
    parser.skip_newlines();
    parser.expect(Token::Colon, "':' after then branch of conditional operator")?;
    parser.skip_newlines();
    let else_expr = parse_expression(parser)?;
    Ok(Expr::Conditional {
        cond: Box::new(cond),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
    })
}

fn parse_or(parser: &mut Parser) -> Result<Expr, ParseError> {
    let mut left = parse_and(parser)?;
    while parser.eat(&Token::PipePipe) {
        parser.skip_newlines();
        let right = parse_and(parser)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(parser: &mut Parser) -> Result<Expr, ParseError> {
    let mut left = parse_equality(parser)?;
    while parser.eat(&Token::AmpAmp) {
        parser.skip_newlines();
        let right = parse_equality(parser)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

/// Parse a left-associative chain of infix operators drawn from `ops`.
fn parse_infix_chain(
    parser: &mut Parser,
    ops: &[Token],
    next: fn(&mut Parser) -> Result<Expr, ParseError>,
) -> Result<Expr, ParseError> {
    let mut left = next(parser)?;
    loop {
        let Some(op) = ops
            .iter()
            .find(|op| parser.check(op))
            .and_then(|op| op.operator_name())
        else {
            return Ok(left);
        };
        parser.advance();
        parser.skip_newlines();
        let right = next(parser)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
}

fn parse_equality(parser: &mut Parser) -> Result<Expr, ParseError> {
    parse_infix_chain(parser, &[Token::EqEq, Token::BangEq], parse_is)
}

fn parse_is(parser: &mut Parser) -> Result<Expr, ParseError> {
    parse_infix_chain(parser, &[Token::Is], parse_comparison)
}

fn parse_comparison(parser: &mut Parser) -> Result<Expr, ParseError> {
    parse_infix_chain(
        parser,
        &[Token::Lt, Token::Gt, Token::LtEq, Token::GtEq],
        parse_range,
    )
}

fn parse_range(parser: &mut Parser) -> Result<Expr, ParseError> {
    let from = parse_term(parser)?;
    let inclusive = match parser.current() {
        Token::DotDot => true,
        Token::DotDotDot => false,
        _ => return Ok(from),
    };
    parser.advance();
    parser.skip_newlines();
    let to = parse_term(parser)?;
    Ok(Expr::Range {
        from: Box::new(from),
        to: Box::new(to),
        inclusive,
    })
}

fn parse_term(parser: &mut Parser) -> Result<Expr, ParseError> {
    parse_infix_chain(parser, &[Token::Plus, Token::Minus], parse_factor)
}

fn parse_factor(parser: &mut Parser) -> Result<Expr, ParseError> {
    parse_infix_chain(
        parser,
        &[Token::Star, Token::Slash, Token::Percent],
        parse_unary,
    )
}

fn parse_unary(parser: &mut Parser) -> Result<Expr, ParseError> {
    let op = match parser.current() {
        Token::Minus => "-",
        Token::Bang => "!",
        Token::Tilde => "~",
        _ => return parse_call(parser),
    };
    parser.advance();
    parser.enter()?;
    let operand = parse_unary(parser);
    parser.leave();
    let operand = operand?;
    if let (Expr::Num(n), "-") = (&operand, op) {
        return Ok(Expr::Num(-n));
    }
    Ok(Expr::Unary {
        op,
        operand: Box::new(operand),
    })
}

fn parse_call(parser: &mut Parser) -> Result<Expr, ParseError> {
    let mut expr = parse_primary(parser)?;
    loop {
        match parser.current() {
            Token::Dot => {
                parser.advance();
                parser.skip_newlines();
                let name = parser.expect_ident("method name after '.'")?;
                expr = parse_call_suffix(parser, Some(Box::new(expr)), name)?;
            }
            Token::LeftBracket => {
                parser.advance();
                let args = parse_arguments(parser, Token::RightBracket, "']' after subscript")?;
                expr = Expr::Subscript {
                    receiver: Box::new(expr),
                    args,
                };
            }
            Token::Newline if matches!(parser.peek_past_newlines(), Token::Dot) => {
                parser.skip_newlines();
            }
            _ => return Ok(expr),
        }
    }
}

/// Parse optional `(args)` and an optional block argument after a method name.
fn parse_call_suffix(
    parser: &mut Parser,
    receiver: Option<Box<Expr>>,
    name: String,
) -> Result<Expr, ParseError> {
    let mut args = None;
    if parser.eat(&Token::LeftParen) {
        args = Some(parse_arguments(
            parser,
            Token::RightParen,
            "')' after arguments",
        )?);
    }
    if parser.check(&Token::LeftBrace) {
        let block = parse_block_argument(parser)?;
        args.get_or_insert_with(Vec::new).push(Expr::Closure(block));
    }
    Ok(Expr::Call {
        receiver,
        name: name.into(),
        args,
    })
}

/// Parse a comma separated expression list; the opening delimiter is consumed.
fn parse_arguments(
    parser: &mut Parser,
    close: Token,
    what: &str,
) -> Result<Vec<Expr>, ParseError> {
    let mut args = Vec::new();
    parser.skip_newlines();
    if parser.eat(&close) {
        return Ok(args);
    }
    loop {
        args.push(parse_expression(parser)?);
        parser.skip_newlines();
        if parser.eat(&Token::Comma) {
            parser.skip_newlines();
            continue;
        }
        parser.expect(close, what)?;
        return Ok(args);
    }
}

/// Parse `{ |a, b| body }`.
pub(crate) fn parse_block_argument(parser: &mut Parser) -> Result<Rc<FnDecl>, ParseError> {
    parser.expect(Token::LeftBrace, "'{' to begin block")?;
    let mut params = Vec::new();
    if parser.eat(&Token::Pipe) {
        loop {
            params.push(parser.expect_ident("parameter name")?.into());
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
        parser.expect(Token::Pipe, "'|' after block parameters")?;
    }
    let body = parse_body(parser)?;
    Ok(Rc::new(FnDecl { params, body }))
}

/// Parse the body of a block or method; the opening `{` is consumed.
///
/// A body that begins on the same line as its `{` and is an expression
/// evaluates to (returns) that expression.
pub(crate) fn parse_body(parser: &mut Parser) -> Result<Rc<Vec<Stmt>>, ParseError> {
    if parser.eat(&Token::RightBrace) {
        return Ok(Rc::new(Vec::new()));
    }
    let starts_statement = matches!(
        parser.current(),
        Token::Newline
            | Token::Var
            | Token::If
            | Token::While
            | Token::For
            | Token::Return
            | Token::Break
            | Token::Continue
            | Token::Import
            | Token::Class
    );
    if starts_statement {
        return Ok(Rc::new(stmt::parse_block_statements(parser)?));
    }

    let line = parser.current_line();
    let expr = parse_expression(parser)?;
    parser.skip_newlines();
    parser.expect(Token::RightBrace, "'}' at end of block")?;
    Ok(Rc::new(vec![Stmt {
        kind: StmtKind::Return(Some(expr)),
        line,
    }]))
}

fn parse_primary(parser: &mut Parser) -> Result<Expr, ParseError> {
    let span = parser.current_span();
    let token = parser.current().clone();
    match token {
        Token::Null => {
            parser.advance();
            Ok(Expr::Null)
        }
        Token::True => {
            parser.advance();
            Ok(Expr::Bool(true))
        }
        Token::False => {
            parser.advance();
            Ok(Expr::Bool(false))
        }
        Token::Number(n) => {
            parser.advance();
            Ok(Expr::Num(n))
        }
        Token::Str(s) => {
            parser.advance();
            Ok(Expr::Str(s.into()))
        }
        Token::Interpolated(parts) => {
            parser.advance();
            parse_interpolation(parts)
        }
        Token::This => {
            parser.advance();
            Ok(Expr::This)
        }
        Token::Field(name) => {
            parser.advance();
            Ok(Expr::Field(name.into()))
        }
        Token::StaticField(name) => {
            parser.advance();
            Ok(Expr::StaticField(name.into()))
        }
        Token::Ident(name) => {
            parser.advance();
            if parser.check(&Token::LeftParen) || parser.check(&Token::LeftBrace) {
                parse_call_suffix(parser, None, name)
            } else {
                Ok(Expr::Var(name.into()))
            }
        }
        Token::LeftParen => {
            parser.advance();
            parser.skip_newlines();
            let expr = parse_expression(parser)?;
            parser.skip_newlines();
            parser.expect(Token::RightParen, "')' after expression")?;
            Ok(expr)
        }
        Token::LeftBracket => {
            parser.advance();
            let items = parse_arguments(parser, Token::RightBracket, "']' after list elements")?;
            Ok(Expr::List(items))
        }
        Token::LeftBrace => {
            parser.advance();
            parse_map_literal(parser)
        }
        _ => Err(ParseError::unexpected("expression", &token, span)),
    }
}

fn parse_map_literal(parser: &mut Parser) -> Result<Expr, ParseError> {
    let mut entries = Vec::new();
    parser.skip_newlines();
    if parser.eat(&Token::RightBrace) {
        return Ok(Expr::Map(entries));
    }
    loop {
        let key = parse_expression(parser)?;
        parser.expect(Token::Colon, "':' after map key")?;
        parser.skip_newlines();
        let value = parse_expression(parser)?;
        entries.push((key, value));
        parser.skip_newlines();
        if parser.eat(&Token::Comma) {
            parser.skip_newlines();
            if parser.eat(&Token::RightBrace) {
                return Ok(Expr::Map(entries));
            }
            continue;
        }
        parser.expect(Token::RightBrace, "'}' after map entries")?;
        return Ok(Expr::Map(entries));
    }
}

fn parse_interpolation(parts: Vec<InterpPart>) -> Result<Expr, ParseError> {
    let mut segments = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            InterpPart::Text(text) => segments.push(InterpSegment::Text(text.into())),
            InterpPart::Code { source, line } => {
                let mut inner = Parser::starting_at(&source, line)
                    .map_err(|mut errors| errors.remove(0))?;
                inner.skip_newlines();
                let expr = parse_expression(&mut inner)?;
                inner.skip_newlines();
                if !inner.at_eof() {
                    return Err(inner.unexpected("')' to end interpolation"));
                }
                segments.push(InterpSegment::Expr(expr));
            }
        }
    }
    Ok(Expr::Interpolation(segments))
}

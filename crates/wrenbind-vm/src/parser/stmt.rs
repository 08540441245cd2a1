//! Statement and class declaration parsing

use std::rc::Rc;

use super::expr::{parse_body, parse_expression};
use super::{ParseError, Parser};
use crate::ast::{ClassDecl, MethodDecl, MethodKind, Stmt, StmtKind};
use crate::token::Token;

/// Parse a single statement, leaving its terminator in place.
pub fn parse_statement(parser: &mut Parser) -> Result<Stmt, ParseError> {
    parser.enter()?;
    let result = parse_statement_inner(parser);
    parser.leave();
    result
}

fn parse_statement_inner(parser: &mut Parser) -> Result<Stmt, ParseError> {
    let line = parser.current_line();
    let kind = match parser.current() {
        Token::Var => parse_var(parser)?,
        Token::Class | Token::Foreign => StmtKind::Class(parse_class(parser)?),
        Token::If => parse_if(parser)?,
        Token::While => parse_while(parser)?,
        Token::For => parse_for(parser)?,
        Token::Import => parse_import(parser)?,
        Token::Break => {
            parser.advance();
            StmtKind::Break
        }
        Token::Continue => {
            parser.advance();
            StmtKind::Continue
        }
        Token::Return => {
            parser.advance();
            if matches!(
                parser.current(),
                Token::Newline | Token::RightBrace | Token::Eof
            ) {
                StmtKind::Return(None)
            } else {
                StmtKind::Return(Some(parse_expression(parser)?))
            }
        }
        Token::LeftBrace => {
            parser.advance();
            StmtKind::Block(parse_block_statements(parser)?)
        }
        _ => StmtKind::Expr(parse_expression(parser)?),
    };
    Ok(Stmt { kind, line })
}

/// Require a statement terminator: a newline, or a closing `}` / end of
/// file which is left for the caller.
pub fn end_statement(parser: &mut Parser) -> Result<(), ParseError> {
    match parser.current() {
        Token::Newline => {
            parser.advance();
            Ok(())
        }
        Token::RightBrace | Token::Eof => Ok(()),
        _ => Err(parser.unexpected("newline after statement")),
    }
}

/// Parse statements up to and including the closing `}`; the opening `{`
/// is consumed.
pub(crate) fn parse_block_statements(parser: &mut Parser) -> Result<Vec<Stmt>, ParseError> {
    let mut statements = Vec::new();
    parser.skip_newlines();
    while !parser.check(&Token::RightBrace) {
        if parser.at_eof() {
            return Err(parser.unexpected("'}' at end of block"));
        }
        statements.push(parse_statement(parser)?);
        end_statement(parser)?;
        parser.skip_newlines();
    }
    parser.advance();
    Ok(statements)
}

fn parse_var(parser: &mut Parser) -> Result<StmtKind, ParseError> {
    parser.advance();
    let name = parser.expect_ident("variable name")?;
    let init = if parser.eat(&Token::Eq) {
        parser.skip_newlines();
        Some(parse_expression(parser)?)
    } else {
        None
    };
    Ok(StmtKind::Var {
        name: name.into(),
        init,
    })
}

fn parse_condition(parser: &mut Parser, keyword: &str) -> Result<crate::ast::Expr, ParseError> {
    parser.expect(Token::LeftParen, &format!("'(' after '{}'", keyword))?;
    parser.skip_newlines();
    let cond = parse_expression(parser)?;
    parser.skip_newlines();
    parser.expect(Token::RightParen, "')' after condition")?;
    Ok(cond)
}

fn parse_if(parser: &mut Parser) -> Result<StmtKind, ParseError> {
    parser.advance();
    let cond = parse_condition(parser, "if")?;
    let then_branch = Box::new(parse_statement(parser)?);

    let has_else = parser.check(&Token::Else)
        || (parser.check(&Token::Newline) && matches!(parser.peek_past_newlines(), Token::Else));
    let else_branch = if has_else {
        parser.skip_newlines();
        parser.advance();
        Some(Box::new(parse_statement(parser)?))
    } else {
        None
    };

    Ok(StmtKind::If {
        cond,
        then_branch,
        else_branch,
    })
}

fn parse_while(parser: &mut Parser) -> Result<StmtKind, ParseError> {
    parser.advance();
    let cond = parse_condition(parser, "while")?;
    let body = Box::new(parse_statement(parser)?);
    Ok(StmtKind::While { cond, body })
}

fn parse_for(parser: &mut Parser) -> Result<StmtKind, ParseError> {
    parser.advance();
    parser.expect(Token::LeftParen, "'(' after 'for'")?;
    let var = parser.expect_ident("loop variable name")?;
    parser.expect(Token::In, "'in' after loop variable")?;
    parser.skip_newlines();
    let seq = parse_expression(parser)?;
    parser.skip_newlines();
    parser.expect(Token::RightParen, "')' after loop expression")?;
    let body = Box::new(parse_statement(parser)?);
    Ok(StmtKind::For {
        var: var.into(),
        seq,
        body,
    })
}

fn parse_import(parser: &mut Parser) -> Result<StmtKind, ParseError> {
    parser.advance();
    let module = match parser.current().clone() {
        Token::Str(name) => {
            parser.advance();
            name
        }
        _ => return Err(parser.unexpected("module name string after 'import'")),
    };

    let mut names = Vec::new();
    if parser.eat(&Token::For) {
        loop {
            parser.skip_newlines();
            let name: Rc<str> = parser.expect_ident("name to import")?.into();
            let alias = if parser.eat(&Token::As) {
                parser.expect_ident("alias after 'as'")?.into()
            } else {
                name.clone()
            };
            names.push((name, alias));
            if !parser.eat(&Token::Comma) {
                break;
            }
        }
    }

    Ok(StmtKind::Import {
        module: module.into(),
        names,
    })
}

fn parse_class(parser: &mut Parser) -> Result<Rc<ClassDecl>, ParseError> {
    let line = parser.current_line();
    let is_foreign = parser.eat(&Token::Foreign);
    parser.expect(Token::Class, "'class'")?;
    let name = parser.expect_ident("class name")?;
    let superclass = if parser.eat(&Token::Is) {
        Some(parser.expect_ident("superclass name after 'is'")?.into())
    } else {
        None
    };
    parser.expect(Token::LeftBrace, "'{' before class body")?;

    let mut methods = Vec::new();
    loop {
        parser.skip_newlines();
        if parser.eat(&Token::RightBrace) {
            break;
        }
        if parser.at_eof() {
            return Err(parser.unexpected("'}' after class body"));
        }
        methods.push(parse_method(parser)?);
        match parser.current() {
            Token::Newline => {
                parser.advance();
            }
            Token::RightBrace => {}
            _ => return Err(parser.unexpected("newline after method definition")),
        }
    }

    Ok(Rc::new(ClassDecl {
        name: name.into(),
        superclass,
        is_foreign,
        methods,
        line,
    }))
}

fn parse_method(parser: &mut Parser) -> Result<MethodDecl, ParseError> {
    let line = parser.current_line();
    let mut is_foreign = false;
    let mut is_static = false;
    loop {
        if parser.eat(&Token::Foreign) {
            is_foreign = true;
        } else if parser.eat(&Token::Static) {
            is_static = true;
        } else {
            break;
        }
    }

    let span = parser.current_span();
    let (kind, name, params) = match parser.current().clone() {
        Token::Construct => {
            parser.advance();
            if is_foreign || is_static {
                return Err(ParseError::new(
                    "Constructors cannot be foreign or static.",
                    span,
                ));
            }
            let name = parser.expect_ident("constructor name")?;
            let params = parse_parameters(parser, Token::LeftParen, Token::RightParen)?;
            (MethodKind::Constructor, name, params)
        }
        Token::Ident(name) => {
            parser.advance();
            if parser.check(&Token::LeftParen) {
                let params = parse_parameters(parser, Token::LeftParen, Token::RightParen)?;
                (MethodKind::Method, name, params)
            } else if parser.eat(&Token::Eq) {
                let params = parse_parameters(parser, Token::LeftParen, Token::RightParen)?;
                if params.len() != 1 {
                    return Err(ParseError::new("A setter takes exactly one parameter.", span));
                }
                (MethodKind::Setter, name, params)
            } else {
                (MethodKind::Getter, name, Vec::new())
            }
        }
        Token::LeftBracket => {
            let mut params = parse_parameters(parser, Token::LeftBracket, Token::RightBracket)?;
            if params.is_empty() {
                return Err(ParseError::new("A subscript takes at least one parameter.", span));
            }
            if parser.eat(&Token::Eq) {
                let value = parse_parameters(parser, Token::LeftParen, Token::RightParen)?;
                if value.len() != 1 {
                    return Err(ParseError::new(
                        "A subscript setter takes exactly one value parameter.",
                        span,
                    ));
                }
                params.extend(value);
                (MethodKind::SubscriptSetter, "[]=".to_string(), params)
            } else {
                (MethodKind::Subscript, "[]".to_string(), params)
            }
        }
        token => match token.operator_name() {
            Some(op) => {
                parser.advance();
                if parser.check(&Token::LeftParen) {
                    let params = parse_parameters(parser, Token::LeftParen, Token::RightParen)?;
                    if params.len() != 1 {
                        return Err(ParseError::new(
                            "An infix operator takes exactly one parameter.",
                            span,
                        ));
                    }
                    (MethodKind::Infix, op.to_string(), params)
                } else if matches!(op, "-" | "!" | "~") {
                    (MethodKind::Prefix, op.to_string(), Vec::new())
                } else {
                    return Err(ParseError::new(
                        format!("'{}' is not a prefix operator.", op),
                        span,
                    ));
                }
            }
            None => return Err(parser.unexpected("method definition")),
        },
    };

    let body = if is_foreign {
        None
    } else {
        parser.expect(Token::LeftBrace, "'{' before method body")?;
        Some(parse_body(parser)?)
    };

    Ok(MethodDecl {
        kind,
        name: name.into(),
        params,
        is_static,
        is_foreign,
        body,
        line,
    })
}

fn parse_parameters(
    parser: &mut Parser,
    open: Token,
    close: Token,
) -> Result<Vec<Rc<str>>, ParseError> {
    parser.expect(open, "'(' before parameters")?;
    let mut params = Vec::new();
    parser.skip_newlines();
    if parser.eat(&close) {
        return Ok(params);
    }
    loop {
        params.push(parser.expect_ident("parameter name")?.into());
        parser.skip_newlines();
        if parser.eat(&Token::Comma) {
            parser.skip_newlines();
            continue;
        }
        parser.expect(close, "')' after parameters")?;
        return Ok(params);
    }
}

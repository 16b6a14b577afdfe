use std::mem;

use tracing::debug;

use crate::ast::{BinaryOperator, Block, Expression, Program, Statement, UnaryOperator};
use crate::runtime::Number;
use crate::token::{self, Span, Token, TokenKind};

mod error;

pub use error::{ParseError, ParseResult};

/// Deepest syntax tree or parser recursion accepted. Both execution paths
/// walk the tree recursively, so this also bounds their native stack use.
pub const MAX_NESTING_DEPTH: usize = 256;

/// An expression paired with the height of its tree.
type Nested = (Expression, usize);

/// LL(1) recursive-descent parser over a token vector.
///
/// Statements are one procedure per grammar rule; binary expressions use
/// precedence climbing driven by [`BinaryOperator::precedence`].
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
    eof: Token<'a>,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        // Stands in for a missing trailing `Eof` so every token vector is accepted.
        let end = tokens.last().map(Token::span).unwrap_or_default();
        let eof = Token::new(
            TokenKind::Eof,
            "",
            Span {
                start: end.end,
                end: end.end,
                line: end.line.max(1),
                column: end.column.max(1),
            },
        );
        Self {
            tokens,
            position: 0,
            eof,
            depth: 0,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !matches!(self.current().kind, TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program {
            body: Block::new(statements),
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.current().kind {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Print => self.parse_print(),
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block()?)),
            _ => self.parse_assignment_or_expression(),
        }
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::If, "'if'")?;
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;
        let else_body = if self.eat(TokenKind::Else) {
            if matches!(self.current().kind, TokenKind::If) {
                Some(Block::new(vec![self.nested(Self::parse_if)?]))
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::While, "'while'")?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Statement::While { condition, body })
    }

    fn parse_print(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Print, "'print'")?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "';' after print statement")?;
        Ok(Statement::Print(value))
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> ParseResult<Block> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !matches!(self.current().kind, TokenKind::RBrace | TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "'}' to close block")?;
        Ok(Block::new(statements))
    }

    /// Both forms start with an expression; an `=` afterwards turns it into an
    /// assignment, which keeps the grammar LL(1).
    fn parse_assignment_or_expression(&mut self) -> ParseResult<Statement> {
        let target_span = self.current().span;
        let expr = self.parse_expression()?;
        if self.eat(TokenKind::Assign) {
            let Expression::Identifier(name) = expr else {
                return Err(ParseError::InvalidAssignmentTarget {
                    line: target_span.line,
                    column: target_span.column,
                });
            };
            let value = self.parse_expression()?;
            self.expect(TokenKind::Semicolon, "';' after assignment")?;
            return Ok(Statement::Assign { name, value });
        }
        self.expect(TokenKind::Semicolon, "';' after expression")?;
        Ok(Statement::Expr(expr))
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary(1, None).map(|(expression, _)| expression)
    }

    /// Precedence climbing: folds every operator binding at least as tightly as
    /// `min_precedence` into `left`. All operators associate left.
    fn parse_binary(
        &mut self,
        min_precedence: u8,
        after: Option<&'static str>,
    ) -> ParseResult<Nested> {
        self.nested(|parser| {
            let (mut left, mut height) = parser.parse_unary(after)?;
            while let Some(op) = binary_operator(&parser.current().kind) {
                let precedence = op.precedence();
                if precedence < min_precedence {
                    break;
                }
                parser.advance();
                let (right, right_height) =
                    parser.parse_binary(precedence + 1, Some(op.symbol()))?;
                height = parser.grow(height.max(right_height))?;
                left = Expression::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                };
            }
            Ok((left, height))
        })
    }

    fn parse_unary(&mut self, after: Option<&'static str>) -> ParseResult<Nested> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Not => UnaryOperator::Not,
            _ => return self.parse_primary(after),
        };
        self.advance();
        let (operand, height) = self.nested(|parser| parser.parse_unary(Some(op.symbol())))?;
        let height = self.grow(height)?;
        Ok((
            Expression::Unary {
                op,
                operand: Box::new(operand),
            },
            height,
        ))
    }

    fn parse_primary(&mut self, after: Option<&'static str>) -> ParseResult<Nested> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                let number = match literal_scale(token.lexeme) {
                    Some(scale) => Number::with_scale(value, scale),
                    None => Number::new(value),
                };
                Ok((Expression::Number(number), 1))
            }
            TokenKind::String(raw) => {
                self.advance();
                Ok((Expression::String(token::unescape(raw)), 1))
            }
            TokenKind::True => {
                self.advance();
                Ok((Expression::Boolean(true), 1))
            }
            TokenKind::False => {
                self.advance();
                Ok((Expression::Boolean(false), 1))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.eat(TokenKind::LParen) {
                    let (args, height) = self.parse_arguments()?;
                    let height = self.grow(height)?;
                    return Ok((
                        Expression::Call {
                            callee: name.to_string(),
                            args,
                        },
                        height,
                    ));
                }
                Ok((Expression::Identifier(name.to_string()), 1))
            }
            TokenKind::LParen => {
                self.advance();
                let nested = self.parse_binary(1, None)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(nested)
            }
            _ => Err(self.error(match after {
                Some(symbol) => format!("expression after '{symbol}'"),
                None => "expression".to_string(),
            })),
        }
    }

    /// Arguments plus the height of the tallest one.
    fn parse_arguments(&mut self) -> ParseResult<(Vec<Expression>, usize)> {
        let mut args = Vec::new();
        let mut height = 0;
        if self.eat(TokenKind::RParen) {
            return Ok((args, height));
        }
        loop {
            let (arg, arg_height) = self.parse_binary(1, None)?;
            height = height.max(arg_height);
            args.push(arg);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' after arguments")?;
        Ok((args, height))
    }

    /// Runs `parse` one recursion level deeper, failing past the limit.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Height of a node whose tallest child is `child_height` high.
    fn grow(&self, child_height: usize) -> ParseResult<usize> {
        let height = child_height + 1;
        if height > MAX_NESTING_DEPTH {
            return Err(self.too_deep());
        }
        Ok(height)
    }

    fn too_deep(&self) -> ParseError {
        let span = self.current().span;
        ParseError::NestingTooDeep {
            limit: MAX_NESTING_DEPTH,
            line: span.line,
            column: span.column,
        }
    }

    fn current(&self) -> &Token<'a> {
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.current().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind<'a>) -> bool {
        if mem::discriminant(&self.current().kind) == mem::discriminant(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>, expected: &str) -> ParseResult<Token<'a>> {
        if mem::discriminant(&self.current().kind) == mem::discriminant(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: token.kind.describe(),
            line: token.span.line,
            column: token.span.column,
        }
    }
}

fn binary_operator(kind: &TokenKind<'_>) -> Option<BinaryOperator> {
    let op = match kind {
        TokenKind::Or => BinaryOperator::Or,
        TokenKind::And => BinaryOperator::And,
        TokenKind::EqualEqual => BinaryOperator::Equal,
        TokenKind::BangEqual => BinaryOperator::NotEqual,
        TokenKind::Less => BinaryOperator::Less,
        TokenKind::LessEqual => BinaryOperator::LessEqual,
        TokenKind::Greater => BinaryOperator::Greater,
        TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Subtract,
        TokenKind::Star => BinaryOperator::Multiply,
        TokenKind::Slash => BinaryOperator::Divide,
        TokenKind::Percent => BinaryOperator::Modulo,
        _ => return None,
    };
    Some(op)
}

/// Digits written after the decimal point, kept so printing can echo them.
fn literal_scale(lexeme: &str) -> Option<u8> {
    if !lexeme.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let (_, fraction) = lexeme.split_once('.')?;
    Some(u8::try_from(fraction.len()).unwrap_or(u8::MAX))
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    let program = Parser::new(tokens).parse_program()?;
    debug!(statements = program.body.statements.len(), "parsed program");
    Ok(program)
}

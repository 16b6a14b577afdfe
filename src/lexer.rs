use std::{iter::Peekable, str::CharIndices};

use tracing::debug;

use crate::token::{self, Span, Token, TokenKind};

mod error;

pub use error::{LexError, LexResult};

/// Hand-written scanner over a source string.
///
/// Each call to [`Lexer::next_token`] runs the automaton from the current
/// position and keeps the longest match. The `Iterator` impl yields tokens up to
/// and including `Eof`, or up to the first error, and then stops.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Rewinds to the start of the source so the token sequence can be replayed.
    pub fn reset(&mut self) {
        *self = Self::new(self.input);
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        self.skip_trivia();

        let (start, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => {
                let index = self.input.len();
                let span = Span {
                    start: index,
                    end: index,
                    line: self.line,
                    column: self.column,
                };
                return Ok(Token::new(TokenKind::Eof, "", span));
            }
        };

        let line = self.line;
        let column = self.column;
        match ch {
            '+' => Ok(self.single(TokenKind::Plus, start, line, column)),
            '-' => Ok(self.single(TokenKind::Minus, start, line, column)),
            '*' => Ok(self.single(TokenKind::Star, start, line, column)),
            '/' => Ok(self.single(TokenKind::Slash, start, line, column)),
            '%' => Ok(self.single(TokenKind::Percent, start, line, column)),
            '(' => Ok(self.single(TokenKind::LParen, start, line, column)),
            ')' => Ok(self.single(TokenKind::RParen, start, line, column)),
            '{' => Ok(self.single(TokenKind::LBrace, start, line, column)),
            '}' => Ok(self.single(TokenKind::RBrace, start, line, column)),
            ';' => Ok(self.single(TokenKind::Semicolon, start, line, column)),
            ',' => Ok(self.single(TokenKind::Comma, start, line, column)),
            '=' => Ok(self.with_equal(
                TokenKind::Assign,
                TokenKind::EqualEqual,
                start,
                line,
                column,
            )),
            '<' => Ok(self.with_equal(
                TokenKind::Less,
                TokenKind::LessEqual,
                start,
                line,
                column,
            )),
            '>' => Ok(self.with_equal(
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                start,
                line,
                column,
            )),
            '!' => {
                if self.peek_second() == Some('=') {
                    self.advance_char();
                    self.advance_char();
                    Ok(self.token(TokenKind::BangEqual, start, line, column))
                } else {
                    Err(LexError::UnexpectedCharacter {
                        character: '!',
                        line,
                        column,
                    })
                }
            }
            '"' => self.read_string(start, line, column),
            '\'' => self.read_character(start, line, column),
            c if c.is_ascii_alphabetic() || c == '_' => {
                Ok(self.read_identifier(start, line, column))
            }
            c if c.is_ascii_digit() => self.read_number(start, line, column),
            _ => Err(LexError::UnexpectedCharacter {
                character: ch,
                line,
                column,
            }),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance_char();
            } else if c == '/' && self.peek_second() == Some('/') {
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance_char();
                }
            } else {
                break;
            }
        }
    }

    fn single(
        &mut self,
        kind: TokenKind<'a>,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token<'a> {
        self.advance_char();
        self.token(kind, start, line, column)
    }

    /// Maximal munch for the operators that have a `=`-suffixed form.
    fn with_equal(
        &mut self,
        short: TokenKind<'a>,
        long: TokenKind<'a>,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token<'a> {
        self.advance_char();
        if matches!(self.chars.peek(), Some(&(_, '='))) {
            self.advance_char();
            self.token(long, start, line, column)
        } else {
            self.token(short, start, line, column)
        }
    }

    fn token(
        &mut self,
        kind: TokenKind<'a>,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token<'a> {
        let end = self.current_index();
        Token::new(
            kind,
            &self.input[start..end],
            Span {
                start,
                end,
                line,
                column,
            },
        )
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end = self.current_index();
        let ident = &self.input[start..end];
        let kind = token::keyword(ident).unwrap_or(TokenKind::Identifier(ident));
        self.token(kind, start, line, column)
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.consume_digits();
        // The dot belongs to the number only when a digit follows it.
        if matches!(self.chars.peek(), Some(&(_, '.')))
            && self.peek_second().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance_char();
            self.consume_digits();
        }

        let end = self.current_index();
        let literal = &self.input[start..end];
        let value = literal
            .parse::<f64>()
            .map_err(|_| LexError::InvalidNumberLiteral {
                literal: literal.to_string(),
                line,
                column,
            })?;
        Ok(self.token(TokenKind::Number(value), start, line, column))
    }

    fn consume_digits(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.advance_char(); // Consume opening quote
        let content_start = start + 1;
        while let Some(&(idx, c)) = self.chars.peek() {
            match c {
                '"' => {
                    self.advance_char(); // Consume closing quote
                    let body = &self.input[content_start..idx];
                    return Ok(self.token(TokenKind::String(body), start, line, column));
                }
                '\n' => break,
                '\\' => {
                    let escape_line = self.line;
                    let escape_column = self.column;
                    self.advance_char();
                    match self.chars.peek() {
                        Some(&(_, 'n' | 't' | '"' | '\\')) => {
                            self.advance_char();
                        }
                        Some(&(_, escape)) if escape != '\n' => {
                            return Err(LexError::InvalidEscape {
                                escape,
                                line: escape_line,
                                column: escape_column,
                            });
                        }
                        _ => break,
                    }
                }
                _ => {
                    self.advance_char();
                }
            }
        }
        Err(LexError::UnterminatedString { line, column })
    }

    /// `'c'` literals evaluate to the character's code point.
    fn read_character(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        let malformed = LexError::InvalidCharacterLiteral { line, column };
        self.advance_char(); // Consume opening quote
        let value = match self.advance_char() {
            Some((_, '\\')) => match self.advance_char() {
                Some((_, 'n')) => '\n',
                Some((_, '\\')) => '\\',
                Some((_, '\'')) => '\'',
                Some((_, escape)) if escape != '\n' => {
                    return Err(LexError::InvalidEscape {
                        escape,
                        line,
                        column,
                    });
                }
                _ => return Err(malformed),
            },
            Some((_, '\'' | '\n')) | None => return Err(malformed),
            Some((_, c)) => c,
        };
        match self.advance_char() {
            Some((_, '\'')) => Ok(self.token(
                TokenKind::Number(f64::from(u32::from(value))),
                start,
                line,
                column,
            )),
            _ => Err(malformed),
        }
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next().map(|(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        // Both end of input and the first error terminate the sequence.
        if !matches!(&result, Ok(token) if token.kind != TokenKind::Eof) {
            self.finished = true;
        }
        Some(result)
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let tokens = Lexer::new(input).collect::<LexResult<Vec<_>>>()?;
    debug!(tokens = tokens.len(), "tokenized source");
    Ok(tokens)
}

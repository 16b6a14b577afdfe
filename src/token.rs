use std::fmt;

/// Location of a token in the source text.
///
/// `start`/`end` are byte offsets; `line` and `column` are 1-based and count
/// characters, which is what diagnostics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Number(f64),
    /// Raw string body between the quotes, escapes not yet resolved.
    String(&'a str),

    // Keywords
    If,
    Else,
    While,
    Print,
    True,
    False,
    And,
    Or,
    Not,

    // Operators
    Assign,       // =
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Delimiters
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    Semicolon, // ;
    Comma,     // ,

    Eof,
}

/// Coarse lexical categories a token kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Identifier,
    NumericLiteral,
    StringLiteral,
    Operator,
    Keyword,
    Delimiter,
    EndOfInput,
}

impl TokenKind<'_> {
    pub fn category(&self) -> TokenCategory {
        match self {
            TokenKind::Identifier(_) => TokenCategory::Identifier,
            TokenKind::Number(_) => TokenCategory::NumericLiteral,
            TokenKind::String(_) => TokenCategory::StringLiteral,
            // Word operators are reserved words first, operators second.
            TokenKind::If
            | TokenKind::Else
            | TokenKind::While
            | TokenKind::Print
            | TokenKind::True
            | TokenKind::False => TokenCategory::Keyword,
            TokenKind::And
            | TokenKind::Or
            | TokenKind::Not
            | TokenKind::Assign
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::EqualEqual
            | TokenKind::BangEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => TokenCategory::Operator,
            TokenKind::LParen
            | TokenKind::RParen
            | TokenKind::LBrace
            | TokenKind::RBrace
            | TokenKind::Semicolon
            | TokenKind::Comma => TokenCategory::Delimiter,
            TokenKind::Eof => TokenCategory::EndOfInput,
        }
    }

    /// Short human-readable description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::Number(value) => format!("number {value}"),
            TokenKind::String(raw) => format!("string \"{raw}\""),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Print => "print",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Identifier(_) | TokenKind::Number(_) | TokenKind::String(_) => "literal",
            TokenKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenCategory::Identifier => "identifier",
            TokenCategory::NumericLiteral => "number",
            TokenCategory::StringLiteral => "string",
            TokenCategory::Operator => "operator",
            TokenCategory::Keyword => "keyword",
            TokenCategory::Delimiter => "delimiter",
            TokenCategory::EndOfInput => "eof",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    /// Exact source slice the token was matched from (empty for `Eof`).
    pub lexeme: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, lexeme: &'a str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

/// Maps an identifier-shaped lexeme onto its reserved word, if any.
pub(crate) fn keyword(ident: &str) -> Option<TokenKind<'static>> {
    let kind = match ident {
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "print" => TokenKind::Print,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => return None,
    };
    Some(kind)
}

/// Resolves the escapes of a string body the lexer has already validated.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_operators_are_operators() {
        assert_eq!(TokenKind::And.category(), TokenCategory::Operator);
        assert_eq!(TokenKind::While.category(), TokenCategory::Keyword);
        assert_eq!(TokenKind::Semicolon.category(), TokenCategory::Delimiter);
    }

    #[test]
    fn unescape_resolves_known_escapes() {
        assert_eq!(unescape(r#"a\nb\t\"q\"\\"#), "a\nb\t\"q\"\\");
    }
}

//! Pattern query lexer using logos

use kgsql_core::{LexError, Span};
use logos::Logos;
use std::fmt;

/// Token kinds
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    // Keywords
    #[token("MATCH", ignore(ascii_case))]
    Match,

    #[token("WHERE", ignore(ascii_case))]
    Where,

    #[token("RETURN", ignore(ascii_case))]
    Return,

    #[token("DISTINCT", ignore(ascii_case))]
    Distinct,

    #[token("ORDER", ignore(ascii_case))]
    Order,

    #[token("BY", ignore(ascii_case))]
    By,

    #[token("ASC", ignore(ascii_case))]
    #[token("ASCENDING", ignore(ascii_case))]
    Asc,

    #[token("DESC", ignore(ascii_case))]
    #[token("DESCENDING", ignore(ascii_case))]
    Desc,

    #[token("SKIP", ignore(ascii_case))]
    Skip,

    #[token("LIMIT", ignore(ascii_case))]
    Limit,

    #[token("AS", ignore(ascii_case))]
    As,

    #[token("IN", ignore(ascii_case))]
    In,

    #[token("CONTAINS", ignore(ascii_case))]
    Contains,

    #[token("STARTS", ignore(ascii_case))]
    Starts,

    #[token("ENDS", ignore(ascii_case))]
    Ends,

    #[token("WITH", ignore(ascii_case))]
    With,

    #[token("IS", ignore(ascii_case))]
    Is,

    // Clauses outside the supported subset, kept as keywords so they are
    // reported as such
    #[token("OPTIONAL", ignore(ascii_case))]
    Optional,

    #[token("CREATE", ignore(ascii_case))]
    Create,

    #[token("MERGE", ignore(ascii_case))]
    Merge,

    #[token("DELETE", ignore(ascii_case))]
    Delete,

    #[token("SET", ignore(ascii_case))]
    Set,

    #[token("UNWIND", ignore(ascii_case))]
    Unwind,

    #[token("CALL", ignore(ascii_case))]
    Call,

    #[token("UNION", ignore(ascii_case))]
    Union,

    // Boolean keywords
    #[token("AND", ignore(ascii_case))]
    And,

    #[token("OR", ignore(ascii_case))]
    Or,

    #[token("XOR", ignore(ascii_case))]
    Xor,

    #[token("NOT", ignore(ascii_case))]
    Not,

    #[token("TRUE", ignore(ascii_case))]
    True,

    #[token("FALSE", ignore(ascii_case))]
    False,

    #[token("NULL", ignore(ascii_case))]
    Null,

    // Symbols
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(".")]
    Dot,

    #[token("|")]
    Pipe,

    #[token("..")]
    DoubleDot,

    #[token("=")]
    Equals,

    #[token("<>")]
    #[token("!=")]
    NotEquals,

    #[token("<")]
    LessThan,

    #[token("<=")]
    LessEquals,

    #[token(">")]
    GreaterThan,

    #[token(">=")]
    GreaterEquals,

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

    // Relationship arrows
    #[token("-->")]
    ArrowRight,

    #[token("<--")]
    ArrowLeft,

    #[token("--")]
    DoubleDash,

    #[token("->")]
    DashArrowRight,

    #[token("<-")]
    ArrowLeftDash,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"`[^`]+`", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    EscapedIdentifier(String),

    // Parameter
    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Parameter(String),

    // Comment (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    BlockComment,
}

/// Strip the quotes of a string literal and resolve backslash escapes
fn unescape(quoted: &str) -> Option<String> {
    let body = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            other => out.push(other),
        }
    }
    Some(out)
}

impl TokenKind {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Match
                | TokenKind::Where
                | TokenKind::Return
                | TokenKind::Distinct
                | TokenKind::Order
                | TokenKind::By
                | TokenKind::Asc
                | TokenKind::Desc
                | TokenKind::Skip
                | TokenKind::Limit
                | TokenKind::As
                | TokenKind::In
                | TokenKind::Contains
                | TokenKind::Starts
                | TokenKind::Ends
                | TokenKind::With
                | TokenKind::Is
                | TokenKind::Optional
                | TokenKind::Create
                | TokenKind::Merge
                | TokenKind::Delete
                | TokenKind::Set
                | TokenKind::Unwind
                | TokenKind::Call
                | TokenKind::Union
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Xor
                | TokenKind::Not
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    /// Check if this token is a literal
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::Integer(_)
                | TokenKind::Float(_)
                | TokenKind::String(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }
}

/// A token with its source text and position
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Span,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Identifier(name) | TokenKind::EscapedIdentifier(name) => {
                write!(f, "identifier '{name}'")
            }
            TokenKind::Parameter(name) => write!(f, "parameter ${name}"),
            TokenKind::String(_) => f.write_str("string literal"),
            TokenKind::Integer(_) | TokenKind::Float(_) => write!(f, "number {}", self.lexeme),
            kind if kind.is_keyword() => write!(f, "keyword {}", self.lexeme.to_ascii_uppercase()),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}

/// Maps byte offsets to line/column positions
struct LineIndex<'a> {
    input: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(input: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(input.match_indices('\n').map(|(i, _)| i + 1));
        Self { input, line_starts }
    }

    fn span(&self, offset: usize, len: usize) -> Span {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line];
        let column = self.input[line_start..offset].chars().count() + 1;
        Span::new(offset, len, line as u32 + 1, column as u32)
    }
}

/// Span just past the last character of `input`, used for end-of-input errors
pub fn end_of_input(input: &str) -> Span {
    LineIndex::new(input).span(input.len(), 0)
}

/// Tokenize a pattern query string
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let lines = LineIndex::new(input);
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = lines.span(range.start, range.len());
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                lexeme: lexer.slice(),
                span,
            }),
            Err(()) => return Err(classify_error(input, span)),
        }
    }

    Ok(tokens)
}

fn classify_error(input: &str, span: Span) -> LexError {
    let ch = input[span.offset..].chars().next().unwrap_or('\0');
    match ch {
        '\'' | '"' => LexError::UnterminatedString { span },
        '`' => LexError::UnterminatedIdentifier { span },
        c if c.is_ascii_digit() => LexError::InvalidNumber {
            text: input[span.offset..span.end()].to_string(),
            span,
        },
        c => LexError::IllegalCharacter { ch: c, span },
    }
}

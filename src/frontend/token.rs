//! Token definitions for C-minus

use std::fmt;

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(span: Span) -> Self {
        Self { kind: TokenKind::Eof, span }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// if
    If,
    /// else
    Else,
    /// int
    Int,
    /// void
    Void,
    /// while
    While,
    /// return
    Return,

    // ============ Literals ============
    /// Identifier
    Ident(String),
    /// Unsigned decimal literal, kept as text until the checker validates it
    Number(String),

    // ============ Operators ============
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    Eq,

    // ============ Delimiters ============
    Semi,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    /// End of file
    Eof,
}

impl TokenKind {
    /// Check if this token is a keyword
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        match ident {
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "int" => Some(TokenKind::Int),
            "void" => Some(TokenKind::Void),
            "while" => Some(TokenKind::While),
            "return" => Some(TokenKind::Return),
            _ => None,
        }
    }

    /// Does this token start a type specifier?
    pub fn is_type_specifier(&self) -> bool {
        matches!(self, TokenKind::Int | TokenKind::Void)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Int => "int",
            TokenKind::Void => "void",
            TokenKind::While => "while",
            TokenKind::Return => "return",
            TokenKind::Ident(name) => return write!(f, "identifier '{}'", name),
            TokenKind::Number(text) => return write!(f, "number {}", text),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Eq => "=",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Eof => return write!(f, "end of file"),
        };
        write!(f, "'{}'", text)
    }
}

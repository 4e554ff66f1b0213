//! Lexer for C-minus
//!
//! Converts source code into a stream of tokens.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The lexer state
pub struct Lexer {
    /// Source code as characters
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Start position of current token
    start: usize,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos)
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    /// Skip whitespace and `/* ... */` comments
    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('*') => {
                    let opened = self.pos;
                    self.advance();
                    self.advance();
                    loop {
                        match (self.peek(), self.peek_next()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                return Err(Error::UnterminatedComment {
                                    span: Span::new(opened, opened + 2),
                                });
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Read an identifier or keyword: a letter followed by letters or digits
    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Ident(text));
        self.make_token(kind)
    }

    /// Read a decimal literal; range checking is left to the semantic checker
    fn read_number(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        self.make_token(TokenKind::Number(text))
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace()?;
        self.start = self.pos;

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(Token::eof(self.make_span())),
        };

        if c.is_ascii_alphabetic() {
            return Ok(self.read_identifier());
        }
        if c.is_ascii_digit() {
            return Ok(self.read_number());
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '<' => self.with_eq(TokenKind::Le, TokenKind::Lt),
            '>' => self.with_eq(TokenKind::Ge, TokenKind::Gt),
            '=' => self.with_eq(TokenKind::EqEq, TokenKind::Eq),
            // '!' only occurs in "!="
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::NotEq
            }
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            _ => {
                return Err(Error::InvalidCharacter {
                    ch: c,
                    span: self.make_span(),
                })
            }
        };

        Ok(self.make_token(kind))
    }

    /// Consume a trailing '=' if present, picking the two-character form
    fn with_eq(&mut self, long: TokenKind, short: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            long
        } else {
            short
        }
    }

    /// Tokenize the entire source and return all tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

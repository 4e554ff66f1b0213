//! Parser for C-minus
//!
//! Recursive descent with one token of lookahead (two when telling a call
//! from a variable). Grammar:
//!
//! ```text
//! program       ::= declaration*
//! declaration   ::= type ID ( ";" | "[" NUM "]" ";" | "(" params ")" block )
//! params        ::= "void" | param ("," param)*
//! param         ::= type ID ( "[" "]" )?
//! block         ::= "{" var-declaration* statement* "}"
//! statement     ::= expr? ";" | block | "if" "(" expr ")" statement ("else" statement)?
//!                 | "while" "(" expr ")" statement | "return" expr? ";"
//! expr          ::= var "=" expr | simple
//! simple        ::= additive (relop additive)?
//! additive      ::= term (("+" | "-") term)*
//! term          ::= factor (("*" | "/") factor)*
//! factor        ::= "(" expr ")" | ID "(" args ")" | var | NUM
//! ```

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Deepest statement/expression nesting accepted before bailing out
pub const MAX_NESTING: usize = 64;

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ids: NodeIds,
    depth: usize,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Result<Self> {
        Ok(Self::from_tokens(lexer.tokenize()?))
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let end = tokens.last().map_or(0, |t| t.span.end);
            tokens.push(Token::eof(Span::new(end, end)));
        }
        Self {
            tokens,
            pos: 0,
            ids: NodeIds::new(),
            depth: 0,
        }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn unexpected<T>(&self, expected: &str) -> Result<T> {
        Err(Error::UnexpectedToken {
            expected: expected.to_string(),
            got: self.current_kind().to_string(),
            span: self.current().span,
        })
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            self.unexpected(&expected.to_string())
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::InternalError(format!(
                "program nests deeper than {} levels",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let start = self.current().span;
        let mut decls = Vec::new();

        while !self.is_at_end() {
            decls.push(self.parse_declaration()?);
        }

        Ok(Program {
            decls,
            span: start.merge(&self.current().span),
        })
    }

    fn parse_type_spec(&mut self) -> Result<TypeSpec> {
        match self.current_kind() {
            TokenKind::Int => {
                self.advance();
                Ok(TypeSpec::Int)
            }
            TokenKind::Void => {
                self.advance();
                Ok(TypeSpec::Void)
            }
            _ => self.unexpected("type specifier ('int' or 'void')"),
        }
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ok(Ident::new(name, token.span))
            }
            _ => self.unexpected("identifier"),
        }
    }

    fn parse_number(&mut self) -> Result<Literal> {
        match self.current_kind().clone() {
            TokenKind::Number(text) => {
                let token = self.advance();
                Ok(Literal {
                    id: self.ids.fresh(),
                    text,
                    span: token.span,
                })
            }
            _ => self.unexpected("number"),
        }
    }

    /// Parse a top-level declaration
    fn parse_declaration(&mut self) -> Result<Decl> {
        let start = self.current().span;
        let spec = self.parse_type_spec()?;
        let name = self.parse_ident()?;

        if self.check(&TokenKind::LParen) {
            Ok(Decl::Fun(self.parse_function(start, spec, name)?))
        } else {
            Ok(Decl::Var(self.finish_var_declaration(start, spec, name)?))
        }
    }

    /// Parse the `;` or `[ NUM ] ;` tail of a variable declaration
    fn finish_var_declaration(&mut self, start: Span, spec: TypeSpec, name: Ident) -> Result<VarDecl> {
        let declarator = if self.consume(&TokenKind::LBracket) {
            let size = self.parse_number()?;
            self.expect(TokenKind::RBracket)?;
            Declarator::Array(size)
        } else {
            Declarator::Scalar
        };
        self.expect(TokenKind::Semi)?;

        Ok(VarDecl {
            id: self.ids.fresh(),
            spec,
            name,
            declarator,
            span: start.merge(&self.previous_span()),
        })
    }

    fn parse_var_declaration(&mut self) -> Result<VarDecl> {
        let start = self.current().span;
        let spec = self.parse_type_spec()?;
        let name = self.parse_ident()?;
        self.finish_var_declaration(start, spec, name)
    }

    /// Parse a function definition after its return type and name
    fn parse_function(&mut self, start: Span, ret: TypeSpec, name: Ident) -> Result<FunDecl> {
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;

        Ok(FunDecl {
            id: self.ids.fresh(),
            ret,
            name,
            params,
            body,
            span: start.merge(&self.previous_span()),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        // A lone `void` means no parameters; `void x` is a (void) parameter
        if self.check(&TokenKind::Void) && matches!(self.peek_kind(), TokenKind::RParen) {
            self.advance();
            return Ok(Vec::new());
        }

        let mut params = vec![self.parse_param()?];
        while self.consume(&TokenKind::Comma) {
            params.push(self.parse_param()?);
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param> {
        let start = self.current().span;
        let spec = self.parse_type_spec()?;
        let name = self.parse_ident()?;

        let declarator = if self.consume(&TokenKind::LBracket) {
            self.expect(TokenKind::RBracket)?;
            Declarator::Pointer
        } else {
            Declarator::Scalar
        };

        Ok(Param {
            id: self.ids.fresh(),
            spec,
            name,
            declarator,
            span: start.merge(&self.previous_span()),
        })
    }

    /// Parse a compound statement
    fn parse_block(&mut self) -> Result<Block> {
        let start = self.expect(TokenKind::LBrace)?.span;

        let mut locals = Vec::new();
        while self.current_kind().is_type_specifier() {
            locals.push(self.parse_var_declaration()?);
        }

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return self.unexpected(&TokenKind::RBrace.to_string());
            }
            stmts.push(self.parse_statement()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span;

        Ok(Block {
            id: self.ids.fresh(),
            locals,
            stmts,
            span: start.merge(&end),
        })
    }

    /// Parse a statement
    fn parse_statement(&mut self) -> Result<Stmt> {
        self.descend()?;
        let stmt = self.parse_statement_inner();
        self.ascend();
        stmt
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        match self.current_kind() {
            TokenKind::Semi => {
                self.advance();
                Ok(Stmt::Empty { span: start })
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::If => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.consume(&TokenKind::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    span: start.merge(&self.previous_span()),
                })
            }
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While {
                    cond,
                    body,
                    span: start.merge(&self.previous_span()),
                })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Return {
                    value,
                    span: start.merge(&self.previous_span()),
                })
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Parse an expression (assignment is right-associative)
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.descend()?;
        let expr = self.parse_expr_inner();
        self.ascend();
        expr
    }

    fn parse_expr_inner(&mut self) -> Result<Expr> {
        let left = self.parse_simple()?;

        if !self.check(&TokenKind::Eq) {
            return Ok(left);
        }

        match left {
            Expr::Var(target) => {
                self.advance();
                let value = self.parse_expr()?;
                let span = target.span.merge(&value.span());
                Ok(Expr::Assign {
                    target,
                    value: Box::new(value),
                    span,
                })
            }
            _ => Err(Error::UnexpectedToken {
                expected: "';' (only a variable can be assigned to)".to_string(),
                got: TokenKind::Eq.to_string(),
                span: self.current().span,
            }),
        }
    }

    /// additive (relop additive)?; relational operators do not chain
    fn parse_simple(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;

        let op = match self.current_kind() {
            TokenKind::Le => BinOp::Le,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::Ne,
            _ => return Ok(left),
        };
        self.advance();

        let right = self.parse_additive()?;
        Ok(binary(left, op, right))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        let mut links = 0;

        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            // every operator in a chain deepens the tree by one
            self.descend()?;
            links += 1;
            let right = self.parse_term()?;
            left = binary(left, op, right);
        }

        self.depth -= links;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;
        let mut links = 0;

        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            self.descend()?;
            links += 1;
            let right = self.parse_factor()?;
            left = binary(left, op, right);
        }

        self.depth -= links;
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        match self.current_kind() {
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Number(_) => Ok(Expr::Literal(self.parse_number()?)),
            TokenKind::Ident(_) => {
                let name = self.parse_ident()?;
                if self.check(&TokenKind::LParen) {
                    self.parse_call(name)
                } else {
                    Ok(Expr::Var(self.parse_var(name)?))
                }
            }
            _ => self.unexpected("expression"),
        }
    }

    fn parse_call(&mut self, callee: Ident) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.parse_expr()?);
            while self.consume(&TokenKind::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        let end = self.expect(TokenKind::RParen)?.span;

        Ok(Expr::Call {
            span: callee.span.merge(&end),
            callee,
            args,
        })
    }

    fn parse_var(&mut self, name: Ident) -> Result<VarRef> {
        let index = if self.consume(&TokenKind::LBracket) {
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            Some(Box::new(index))
        } else {
            None
        };

        Ok(VarRef {
            id: self.ids.fresh(),
            span: name.span.merge(&self.previous_span()),
            name,
            index,
        })
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = left.span().merge(&right.span());
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
        span,
    }
}

/// Lex and parse a whole source text
pub fn parse_source(source: &str) -> Result<Program> {
    Parser::new(Lexer::new(source))?.parse_program()
}

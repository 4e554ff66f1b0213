//! Abstract Syntax Tree definitions for C-minus
//!
//! The tree is never mutated after parsing. Nodes the checker needs to say
//! something about carry a [`NodeId`]; the facts themselves live in
//! [`Annotations`](crate::frontend::checked::Annotations).

use serde::Serialize;

use crate::utils::Span;

/// Identity of an annotatable node, unique within one parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Hands out fresh node ids
#[derive(Debug, Default)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// A complete program (compilation unit)
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// Top-level declarations
#[derive(Debug, Clone, Serialize)]
pub enum Decl {
    Var(VarDecl),
    Fun(FunDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Var(var) => var.span,
            Decl::Fun(fun) => fun.span,
        }
    }
}

/// Type specifier keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeSpec {
    Int,
    Void,
}

/// What follows the name in a declaration
#[derive(Debug, Clone, Serialize)]
pub enum Declarator {
    /// `x`
    Scalar,
    /// `x[N]`
    Array(Literal),
    /// `x[]`, only meaningful for parameters
    Pointer,
}

/// Variable declaration: `int x;` or `int x[10];`
#[derive(Debug, Clone, Serialize)]
pub struct VarDecl {
    pub id: NodeId,
    pub spec: TypeSpec,
    pub name: Ident,
    pub declarator: Declarator,
    pub span: Span,
}

/// Function parameter: `int x` or `int x[]`
#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub id: NodeId,
    pub spec: TypeSpec,
    pub name: Ident,
    pub declarator: Declarator,
    pub span: Span,
}

/// Function declaration
#[derive(Debug, Clone, Serialize)]
pub struct FunDecl {
    pub id: NodeId,
    pub ret: TypeSpec,
    pub name: Ident,
    /// Empty for a `(void)` parameter list
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

/// Compound statement: local declarations followed by statements
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub id: NodeId,
    pub locals: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, Serialize)]
pub enum Stmt {
    /// Expression statement
    Expr(Expr),
    /// `;`
    Empty { span: Span },
    /// return [expr] ;
    Return { value: Option<Expr>, span: Span },
    /// while ( cond ) body
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    /// if ( cond ) then [else otherwise]
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    /// { ... }
    Block(Block),
}

/// Expression
#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    /// Integer literal
    Literal(Literal),
    /// Variable reference, optionally subscripted
    Var(VarRef),
    /// var = expr
    Assign {
        target: VarRef,
        value: Box<Expr>,
        span: Span,
    },
    /// Binary operation
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
        span: Span,
    },
    /// Function call
    Call {
        callee: Ident,
        args: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(lit) => lit.span,
            Expr::Var(var) => var.span,
            Expr::Assign { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
            Expr::Call { span, .. } => *span,
        }
    }
}

/// Integer literal, kept as written
#[derive(Debug, Clone, Serialize)]
pub struct Literal {
    pub id: NodeId,
    pub text: String,
    pub span: Span,
}

/// Variable reference: `x` or `x[expr]`
#[derive(Debug, Clone, Serialize)]
pub struct VarRef {
    pub id: NodeId,
    pub name: Ident,
    pub index: Option<Box<Expr>>,
    pub span: Span,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Le,
    Lt,
    Gt,
    Ge,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    /// Source spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Le => "<=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// Identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

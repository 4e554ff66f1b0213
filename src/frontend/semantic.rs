//! Semantic Analysis for C-minus
//!
//! Performs, in one pass over the tree:
//! - Symbol table management (scopes, storage offsets)
//! - Type checking
//! - The `void main(void)` program contract
//!
//! The tree itself is never touched. Literal values, resolved variable
//! storage and block frame sizes are recorded in [`Annotations`], and a
//! successful run hands both back as a [`CheckedProgram`].

use crate::frontend::ast::*;
use crate::frontend::checked::{Annotations, CheckedProgram, VarInfo};
use crate::frontend::parser::MAX_NESTING;
use crate::frontend::symbol_table::{Allocation, SymbolTable};
use crate::types::{Position, PrimitiveType, Type, WORD_SIZE};
use crate::utils::{Error, Result};

/// Check a parsed program
pub fn check(program: Program) -> Result<CheckedProgram> {
    SemanticAnalyzer::new().analyze(program)
}

/// Semantic analyzer
pub struct SemanticAnalyzer {
    symbols: SymbolTable,
    notes: Annotations,
    depth: usize,
    /// Set by every `return` in the function being checked
    saw_return: bool,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            notes: Annotations::new(),
            depth: 0,
            saw_return: false,
        }
    }

    /// Analyze a program, stopping at the first error
    pub fn analyze(&mut self, program: Program) -> Result<CheckedProgram> {
        for decl in &program.decls {
            match decl {
                Decl::Var(var) => self.check_var_decl(var)?,
                Decl::Fun(fun) => self.check_fun_decl(fun)?,
            }
        }
        self.check_main_contract(&program)?;

        if self.symbols.depth() != 0 {
            return Err(Error::InternalError(format!(
                "{} scopes left open after analysis",
                self.symbols.depth()
            )));
        }

        let notes = std::mem::take(&mut self.notes);
        Ok(CheckedProgram::new(program, notes))
    }

    /// The last declaration must be `void main(void)`
    fn check_main_contract(&self, program: &Program) -> Result<()> {
        let main = match program.decls.last() {
            Some(Decl::Fun(fun)) if fun.name.name == "main" => fun,
            Some(decl) => return Err(Error::MissingMainContract { span: decl.span() }),
            None => return Err(Error::MissingMainContract { span: program.span }),
        };

        let symbol = self.symbols.resolve(&main.name)?;
        if !symbol.ty.equivalent(&Type::void_main()) {
            return Err(Error::MissingMainContract { span: main.span });
        }
        Ok(())
    }

    /// Run `f` inside a fresh scope, releasing it on every exit path
    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.symbols.enter_scope();
        let result = f(self);
        self.symbols.exit_scope();
        result
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

    // ==================== Declarations ====================

    fn check_var_decl(&mut self, var: &VarDecl) -> Result<()> {
        let prim = PrimitiveType::of(var.spec, &var.declarator, Position::Variable)?;
        if prim == PrimitiveType::Void {
            return Err(Error::VoidVariable {
                name: var.name.name.clone(),
                span: var.name.span,
            });
        }

        let words = match &var.declarator {
            Declarator::Array(size) => {
                let count = self.check_literal(size)?;
                // the storage must stay addressable as a byte displacement
                if count == 0 || count.checked_mul(WORD_SIZE).is_none() {
                    return Err(Error::BadLiteralValue {
                        text: size.text.clone(),
                        span: size.span,
                    });
                }
                count as u32
            }
            _ => 1,
        };

        let offset = self
            .symbols
            .define(&var.name, Type::variable(prim), Allocation::Local { words })?;
        self.notes.set_var(var.id, VarInfo { prim, offset });
        Ok(())
    }

    fn check_param(&mut self, param: &Param) -> Result<PrimitiveType> {
        let prim = PrimitiveType::of(param.spec, &param.declarator, Position::Parameter)?;
        if prim == PrimitiveType::Void {
            return Err(Error::VoidVariable {
                name: param.name.name.clone(),
                span: param.name.span,
            });
        }

        let offset = self
            .symbols
            .define(&param.name, Type::variable(prim), Allocation::Param)?;
        self.notes.set_var(param.id, VarInfo { prim, offset });
        Ok(prim)
    }

    fn check_fun_decl(&mut self, fun: &FunDecl) -> Result<()> {
        let ret = PrimitiveType::returned(fun.ret);

        self.with_scope(|this| {
            let mut fntype = Type::function(ret);
            if fun.params.is_empty() {
                fntype.takes(PrimitiveType::Void)?;
            }
            for param in &fun.params {
                let prim = this.check_param(param)?;
                fntype.takes(prim)?;
            }

            // visible to its own body
            this.symbols.define_global(&fun.name, fntype)?;

            // the body shares the parameter scope
            this.saw_return = false;
            this.check_block_contents(&fun.body, ret)?;

            if ret != PrimitiveType::Void && !this.saw_return {
                return Err(Error::ReturnTypeError {
                    name: fun.name.name.clone(),
                    span: fun.name.span,
                });
            }
            Ok(())
        })
    }

    /// Locals, then statements, in the current scope
    fn check_block_contents(&mut self, block: &Block, ret: PrimitiveType) -> Result<()> {
        let entry = self.symbols.varmax();
        for local in &block.locals {
            self.check_var_decl(local)?;
        }
        self.notes.set_frame(block.id, self.symbols.varmax() - entry);

        for stmt in &block.stmts {
            self.check_stmt(stmt, ret)?;
        }
        Ok(())
    }

    // ==================== Statements ====================

    fn check_stmt(&mut self, stmt: &Stmt, ret: PrimitiveType) -> Result<()> {
        self.descend()?;
        let result = self.check_stmt_inner(stmt, ret);
        self.ascend();
        result
    }

    fn check_stmt_inner(&mut self, stmt: &Stmt, ret: PrimitiveType) -> Result<()> {
        match stmt {
            Stmt::Expr(expr) => {
                let prim = self.check_expr(expr)?;
                if prim.is_aggregate() {
                    return Err(Error::type_error(
                        format!("expression statement has array type {}", prim),
                        expr.span(),
                    ));
                }
                Ok(())
            }

            Stmt::Empty { .. } => Ok(()),

            Stmt::Return { value, span } => {
                self.saw_return = true;
                match (ret, value) {
                    (PrimitiveType::Void, None) => Ok(()),
                    (PrimitiveType::Void, Some(value)) => Err(Error::type_error(
                        "void function cannot return a value",
                        value.span(),
                    )),
                    (_, None) => Err(Error::type_error(
                        format!("function must return a value of type {}", ret),
                        *span,
                    )),
                    (_, Some(value)) => {
                        let got = self.check_expr(value)?;
                        if !got.equivalent(ret) {
                            return Err(Error::type_error(
                                format!("cannot return {} from a function returning {}", got, ret),
                                value.span(),
                            ));
                        }
                        Ok(())
                    }
                }
            }

            Stmt::While { cond, body, .. } => {
                self.expect_int(cond, "loop condition")?;
                self.check_stmt(body, ret)
            }

            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.expect_int(cond, "if condition")?;
                self.check_stmt(then_branch, ret)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch, ret)?;
                }
                Ok(())
            }

            Stmt::Block(block) => self.with_scope(|this| this.check_block_contents(block, ret)),
        }
    }

    // ==================== Expressions ====================

    fn check_expr(&mut self, expr: &Expr) -> Result<PrimitiveType> {
        self.descend()?;
        let result = self.check_expr_inner(expr);
        self.ascend();
        result
    }

    fn check_expr_inner(&mut self, expr: &Expr) -> Result<PrimitiveType> {
        match expr {
            Expr::Literal(lit) => {
                self.check_literal(lit)?;
                Ok(PrimitiveType::Int)
            }

            Expr::Var(var) => self.check_var_ref(var),

            Expr::Assign { target, value, span } => {
                let target_prim = self.check_var_ref(target)?;
                if target_prim != PrimitiveType::Int {
                    return Err(Error::type_error(
                        format!("cannot assign to '{}' of type {}", target.name.name, target_prim),
                        *span,
                    ));
                }
                let value_prim = self.check_expr(value)?;
                if !value_prim.equivalent(target_prim) {
                    return Err(Error::type_error(
                        format!("cannot assign {} to {}", value_prim, target_prim),
                        value.span(),
                    ));
                }
                Ok(PrimitiveType::Int)
            }

            Expr::Binary { left, op, right, .. } => {
                let what = format!("operand of '{}'", op.symbol());
                self.expect_int(left, &what)?;
                self.expect_int(right, &what)?;
                Ok(PrimitiveType::Int)
            }

            Expr::Call { callee, args, span } => {
                let symbol = self.symbols.resolve(callee)?;
                let func = match &symbol.ty {
                    Type::Function(func) => func.clone(),
                    Type::Variable(prim) => {
                        return Err(Error::type_error(
                            format!("'{}' of type {} is not a function", callee.name, prim),
                            callee.span,
                        ))
                    }
                };

                let expected = func.expected_args();
                if args.len() != expected.len() {
                    return Err(Error::ArityMismatch {
                        name: callee.name.clone(),
                        expected: expected.len(),
                        got: args.len(),
                        span: *span,
                    });
                }

                for (i, (arg, param)) in args.iter().zip(expected).enumerate() {
                    let got = self.check_expr(arg)?;
                    if !got.equivalent(*param) {
                        return Err(Error::type_error(
                            format!(
                                "argument {} of '{}' expects {}, found {}",
                                i + 1,
                                callee.name,
                                param,
                                got
                            ),
                            arg.span(),
                        ));
                    }
                }
                Ok(func.ret)
            }
        }
    }

    fn check_literal(&mut self, lit: &Literal) -> Result<i32> {
        let value = lit.text.parse::<i32>().map_err(|_| Error::BadLiteralValue {
            text: lit.text.clone(),
            span: lit.span,
        })?;
        self.notes.set_literal(lit.id, value);
        Ok(value)
    }

    fn check_var_ref(&mut self, var: &VarRef) -> Result<PrimitiveType> {
        let symbol = self.symbols.resolve(&var.name)?;
        let info = match symbol.ty {
            Type::Variable(prim) => VarInfo {
                prim,
                offset: symbol.offset,
            },
            Type::Function(_) => {
                return Err(Error::type_error(
                    format!("function '{}' used as a variable", var.name.name),
                    var.span,
                ))
            }
        };
        self.notes.set_var(var.id, info);

        let Some(index) = &var.index else {
            return Ok(info.prim);
        };
        if !info.prim.is_aggregate() {
            return Err(Error::type_error(
                format!("'{}' of type {} cannot be subscripted", var.name.name, info.prim),
                var.span,
            ));
        }
        self.expect_int(index, "array index")?;
        Ok(PrimitiveType::Int)
    }

    fn expect_int(&mut self, expr: &Expr, what: &str) -> Result<()> {
        let prim = self.check_expr(expr)?;
        if prim != PrimitiveType::Int {
            return Err(Error::type_error(
                format!("{} must be int, found {}", what, prim),
                expr.span(),
            ));
        }
        Ok(())
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;
    use crate::types::parameter_offset;
    use crate::utils::Span;

    fn analyze(source: &str) -> Result<CheckedProgram> {
        check(parse_source(source)?)
    }

    fn find_local<'a>(block: &'a Block, name: &str) -> &'a VarDecl {
        block.locals.iter().find(|v| v.name.name == name).unwrap()
    }

    fn function<'a>(checked: &'a CheckedProgram, name: &str) -> &'a FunDecl {
        checked
            .program()
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Fun(fun) if fun.name.name == name => Some(fun),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_minimal_program() {
        assert!(analyze("void main(void) { }").is_ok());
    }

    #[test]
    fn test_global_assignment() {
        let checked = analyze("int x; void main(void) { x = 1; return; }").unwrap();
        let decl = match &checked.program().decls[0] {
            Decl::Var(var) => var,
            _ => unreachable!(),
        };
        let info = checked.notes().var_by_id(decl.id);
        assert_eq!(info.prim, PrimitiveType::Int);
        assert!(info.is_global());
    }

    #[test]
    fn test_missing_main_contract() {
        for source in [
            "",
            "int main(void) { return 0; }",
            "void main(int x) { }",
            "void main(void) { } int x;",
            "void f(void) { }",
        ] {
            let err = analyze(source).unwrap_err();
            assert!(
                matches!(err, Error::MissingMainContract { .. }),
                "{:?} gave {:?}",
                source,
                err
            );
        }
    }

    #[test]
    fn test_redeclaration() {
        let err = analyze("int f(int a) { return a; } int f(int b) { return b; } void main(void) { }")
            .unwrap_err();
        assert!(matches!(err, Error::Redeclaration { ref name, .. } if name == "f"));

        let err = analyze("void main(void) { int x; int x; }").unwrap_err();
        assert!(matches!(err, Error::Redeclaration { .. }));

        let err = analyze("int x; int x; void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::Redeclaration { .. }));

        // parameters and body locals share a scope
        let err = analyze("void f(int a) { int a; } void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::Redeclaration { .. }));

        let err = analyze("void input(void) { } void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::Redeclaration { ref name, .. } if name == "input"));
    }

    #[test]
    fn test_shadowing_resolves_inner() {
        let source = "int x; void main(void) { int x[2]; x[0] = 1; { int x; x = 2; } }";
        let checked = analyze(source).unwrap();
        let main = function(&checked, "main");
        let notes = checked.notes();

        let outer_local = notes.var_by_id(find_local(&main.body, "x").id);
        assert_eq!(outer_local.prim, PrimitiveType::Array);
        assert_eq!(outer_local.offset, -8);

        let refs: Vec<VarInfo> = main
            .body
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Expr(Expr::Assign { target, .. }) => Some(notes.var(target)),
                Stmt::Block(block) => match &block.stmts[0] {
                    Stmt::Expr(Expr::Assign { target, .. }) => Some(notes.var(target)),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(
            refs,
            vec![
                VarInfo { prim: PrimitiveType::Array, offset: -8 },
                VarInfo { prim: PrimitiveType::Int, offset: -12 },
            ]
        );
    }

    #[test]
    fn test_literal_range() {
        assert!(analyze("void main(void) { output(2147483647); }").is_ok());
        let err = analyze("void main(void) { output(2147483648); }").unwrap_err();
        assert!(matches!(err, Error::BadLiteralValue { ref text, .. } if text == "2147483648"));
    }

    #[test]
    fn test_literal_values_recorded() {
        let checked = analyze("void main(void) { output(42); }").unwrap();
        let main = function(&checked, "main");
        match &main.body.stmts[0] {
            Stmt::Expr(Expr::Call { args, .. }) => match &args[0] {
                Expr::Literal(lit) => assert_eq!(checked.notes().literal(lit), 42),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_array_sizes() {
        let err = analyze("int a[0]; void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::BadLiteralValue { .. }));
        let err = analyze("int a[99999999999]; void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::BadLiteralValue { .. }));
    }

    #[test]
    fn test_oversized_arrays() {
        let err = analyze("int a[1000000000]; void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::BadLiteralValue { ref text, .. } if text == "1000000000"));
        let err = analyze("void main(void) { int a[1000000000]; }").unwrap_err();
        assert!(matches!(err, Error::BadLiteralValue { .. }));
        assert!(analyze("void main(void) { int a[536870911]; }").is_ok());
    }

    #[test]
    fn test_frame_exhaustion() {
        let err = analyze("void main(void) { int a[500000000]; int b[500000000]; }").unwrap_err();
        assert!(matches!(err, Error::InternalError(_)));
        assert!(err.is_fatal());

        let err = analyze("void main(void) { int a[500000000]; { int b[500000000]; } }").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_long_sums_check() {
        let sum = vec!["1"; MAX_NESTING / 2].join(" + ");
        assert!(analyze(&format!("void main(void) {{ output({}); }}", sum)).is_ok());
    }

    #[test]
    fn test_arity_and_argument_types() {
        let prelude = "int f(int a) { return a; } int g(int v[]) { return v[0]; } ";
        let cases = [
            ("f(1, 2);", "arity"),
            ("f();", "arity"),
            ("input(1);", "arity"),
            ("output();", "arity"),
            ("g(1);", "type"),
        ];
        for (call, kind) in cases {
            let source = format!("{}void main(void) {{ int arr[3]; {} }}", prelude, call);
            let err = analyze(&source).unwrap_err();
            match kind {
                "arity" => assert!(matches!(err, Error::ArityMismatch { .. }), "{}: {:?}", call, err),
                _ => assert!(matches!(err, Error::TypeError { .. }), "{}: {:?}", call, err),
            }
        }

        let err = analyze("int f(int a) { return a; } void main(void) { int arr[3]; f(arr); }").unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
    }

    #[test]
    fn test_arrays_decay_to_pointers() {
        let source = "int sum(int v[], int n) { return v[0] + n; } \
                      int pass(int v[]) { return sum(v, 1); } \
                      int g[4]; \
                      void main(void) { int l[2]; output(sum(g, 4) + pass(l)); }";
        assert!(analyze(source).is_ok());
    }

    #[test]
    fn test_returns() {
        let err = analyze("void f(void) { return 1; } void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));

        let err = analyze("int f(void) { return; } void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));

        let err = analyze("int f(int v[]) { return v; } void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));

        let err = analyze("int f(void) { output(1); } void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::ReturnTypeError { ref name, .. } if name == "f"));

        assert!(analyze("int f(int a) { if (a) return 1; else return 0; } void main(void) { }").is_ok());
    }

    #[test]
    fn test_void_variables() {
        let err = analyze("void x; void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::VoidVariable { ref name, .. } if name == "x"));

        let err = analyze("void f(void v) { } void main(void) { }").unwrap_err();
        assert!(matches!(err, Error::VoidVariable { ref name, .. } if name == "v"));
    }

    #[test]
    fn test_undeclared() {
        let err = analyze("void main(void) { y = 1; }").unwrap_err();
        assert!(matches!(err, Error::UndeclaredSymbol { ref name, .. } if name == "y"));

        let err = analyze("void main(void) { nothing(); }").unwrap_err();
        assert!(matches!(err, Error::UndeclaredSymbol { .. }));
    }

    #[test]
    fn test_function_variable_confusion() {
        let err = analyze("int x; void main(void) { x(); }").unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));

        let err = analyze("void main(void) { output(input); }").unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
    }

    #[test]
    fn test_operand_and_condition_types() {
        for body in [
            "int a[2]; a = 1;",
            "int a[2]; a;",
            "int a[2]; output(a + 1);",
            "int a[2]; while (a) { }",
            "int a[2]; if (a) ;",
            "int a; a[0] = 1;",
            "int a[2]; a[a] = 1;",
            "output(output(1));",
        ] {
            let source = format!("void main(void) {{ {} }}", body);
            let err = analyze(&source).unwrap_err();
            assert!(matches!(err, Error::TypeError { .. }), "{}: {:?}", body, err);
        }
    }

    #[test]
    fn test_recursion() {
        let source = "int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); } \
                      void main(void) { output(fact(input())); }";
        assert!(analyze(source).is_ok());
    }

    #[test]
    fn test_parameter_offsets() {
        let checked = analyze("int f(int a, int b[], int c) { return a; } void main(void) { }").unwrap();
        let f = function(&checked, "f");
        for (i, param) in f.params.iter().enumerate() {
            assert_eq!(checked.notes().var_by_id(param.id).offset, parameter_offset(i));
        }
        assert_eq!(checked.notes().var_by_id(f.params[1].id).prim, PrimitiveType::Pointer);
    }

    #[test]
    fn test_block_frames() {
        let source = "void main(void) { int a; int b[3]; { int c; c = 1; } { } }";
        let checked = analyze(source).unwrap();
        let main = function(&checked, "main");
        let notes = checked.notes();

        assert_eq!(notes.frame(&main.body), -16);
        match (&main.body.stmts[0], &main.body.stmts[1]) {
            (Stmt::Block(inner), Stmt::Block(empty)) => {
                assert_eq!(notes.frame(inner), -4);
                assert_eq!(notes.var_by_id(find_local(inner, "c").id).offset, -20);
                assert_eq!(notes.frame(empty), 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scope_released_after_error() {
        let program = parse_source("void main(void) { { { int x; x = y; } } }").unwrap();
        let mut analyzer = SemanticAnalyzer::new();
        let err = analyzer.analyze(program).unwrap_err();
        assert!(matches!(err, Error::UndeclaredSymbol { .. }));
        assert_eq!(analyzer.symbols.depth(), 0);
        assert!(analyzer.symbols.lookup("x").is_none());
    }

    #[test]
    fn test_nesting_guard() {
        let mut expr = Expr::Literal(Literal {
            id: NodeId(0),
            text: "1".to_string(),
            span: Span::dummy(),
        });
        for _ in 0..MAX_NESTING + 1 {
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinOp::Add,
                right: Box::new(Expr::Literal(Literal {
                    id: NodeId(0),
                    text: "1".to_string(),
                    span: Span::dummy(),
                })),
                span: Span::dummy(),
            };
        }
        let program = Program {
            decls: vec![Decl::Fun(FunDecl {
                id: NodeId(1),
                ret: TypeSpec::Void,
                name: Ident::new("main", Span::dummy()),
                params: Vec::new(),
                body: Block {
                    id: NodeId(2),
                    locals: Vec::new(),
                    stmts: vec![Stmt::Expr(expr)],
                    span: Span::dummy(),
                },
                span: Span::dummy(),
            })],
            span: Span::dummy(),
        };
        let err = check(program).unwrap_err();
        assert!(err.is_fatal());
    }
}

//! MIPS Code Generator
//!
//! Emits SPIM assembly for a checked program. Every expression leaves its
//! value in `$a0`; intermediate values are pushed on the stack one word at
//! a time. Frames look like this, the stack growing down:
//!
//! ```text
//!   arg n-1       $fp + 4n
//!   ...
//!   arg 0         $fp + 4
//!   saved $ra     $fp
//!   locals        $fp - 4, $fp - 8, ...
//! ```
//!
//! The caller saves `$fp` before pushing arguments and restores it after
//! the call returns.

use crate::backend::codegen::CodeGen;
use crate::frontend::ast::*;
use crate::frontend::checked::{Annotations, CheckedProgram};
use crate::types::{parameter_offset, PrimitiveType, WORD_SIZE};

/// Runtime support for the `output` and `input` built-ins
const BUILTINS: &str = "\
.text
_f_output:
  lw $a0, 4($sp)
  li $v0, 1
  syscall
  li $v0, 11
  li $a0, 0x0a
  syscall
  li $a0, 0
  jr $ra

_f_input:
  li $v0, 5
  syscall
  move $a0, $v0
  jr $ra

";

/// Program entry: run `main`, then exit
const ENTRY: &str = "\
main:
  jal _f_main
  li $v0, 10
  syscall
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Text,
    Data,
}

/// MIPS code generator
pub struct MipsCodeGen {
    output: String,
    segment: Segment,
    /// Shared by `while` and `if` labels
    label_counter: usize,
}

impl MipsCodeGen {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            segment: Segment::Text,
            label_counter: 0,
        }
    }

    /// Write one indented instruction
    fn writeln(&mut self, line: &str) {
        self.output.push_str("  ");
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Write raw text (labels, directives)
    fn write_raw(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn label(&mut self, name: &str) {
        self.write_raw(&format!("{}:\n", name));
    }

    fn switch_to(&mut self, segment: Segment) {
        if self.segment != segment {
            self.segment = segment;
            self.write_raw(match segment {
                Segment::Text => "\n.text\n",
                Segment::Data => "\n.data\n",
            });
        }
    }

    fn fresh_label(&mut self) -> usize {
        let label = self.label_counter;
        self.label_counter += 1;
        label
    }

    /// Push `$a0`
    fn push(&mut self) {
        self.writeln("sw $a0, 0($sp)");
        self.writeln(&format!("addiu $sp, $sp, -{}", WORD_SIZE));
    }

    // ==================== Declarations ====================

    fn generate_global(&mut self, var: &VarDecl, notes: &Annotations) {
        self.switch_to(Segment::Data);
        let bytes = match &var.declarator {
            Declarator::Array(size) => i64::from(notes.literal(size)) * i64::from(WORD_SIZE),
            _ => i64::from(WORD_SIZE),
        };
        self.write_raw(&format!("_v_{}: .space {}\n", var.name.name, bytes));
    }

    fn generate_function(&mut self, fun: &FunDecl, notes: &Annotations) {
        self.switch_to(Segment::Text);
        let name = &fun.name.name;

        self.label(&format!("_f_{}", name));
        self.writeln("sw $ra, 0($sp)");
        self.writeln("move $fp, $sp");
        self.writeln(&format!("addiu $sp, $sp, -{}", WORD_SIZE));

        self.generate_block(&fun.body, name, notes);

        self.label(&format!("_f_{}_exit", name));
        self.writeln("move $sp, $fp");
        self.writeln("lw $ra, 0($sp)");
        self.writeln("jr $ra");
        self.write_raw("\n");
    }

    // ==================== Statements ====================

    fn generate_block(&mut self, block: &Block, function: &str, notes: &Annotations) {
        if block.locals.is_empty() && block.stmts.is_empty() {
            return;
        }

        let frame = notes.frame(block);
        if frame != 0 {
            self.writeln(&format!("addiu $sp, $sp, {}", frame));
        }
        for stmt in &block.stmts {
            self.generate_stmt(stmt, function, notes);
        }
        if frame != 0 {
            self.writeln(&format!("addiu $sp, $sp, {}", frame.unsigned_abs()));
        }
    }

    fn generate_stmt(&mut self, stmt: &Stmt, function: &str, notes: &Annotations) {
        match stmt {
            Stmt::Expr(expr) => self.generate_expr(expr, notes),

            Stmt::Empty { .. } => {}

            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.generate_expr(value, notes);
                }
                self.writeln(&format!("j _f_{}_exit", function));
            }

            Stmt::While { cond, body, .. } => {
                let label = self.fresh_label();
                self.label(&format!("_while_{}", label));
                self.generate_expr(cond, notes);
                self.writeln(&format!("beq $a0, $zero, _end_while_{}", label));
                self.generate_stmt(body, function, notes);
                self.writeln(&format!("b _while_{}", label));
                self.label(&format!("_end_while_{}", label));
            }

            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let label = self.fresh_label();
                self.generate_expr(cond, notes);

                match else_branch {
                    Some(else_branch) => {
                        // false branch falls through, true branch is jumped to
                        self.writeln(&format!("bne $a0, $zero, _if_{}", label));
                        self.generate_stmt(else_branch, function, notes);
                        self.writeln(&format!("b _end_if_{}", label));
                        self.label(&format!("_if_{}", label));
                        self.generate_stmt(then_branch, function, notes);
                    }
                    None => {
                        self.writeln(&format!("beq $a0, $zero, _end_if_{}", label));
                        self.generate_stmt(then_branch, function, notes);
                    }
                }
                self.label(&format!("_end_if_{}", label));
            }

            Stmt::Block(block) => self.generate_block(block, function, notes),
        }
    }

    // ==================== Expressions ====================

    fn generate_expr(&mut self, expr: &Expr, notes: &Annotations) {
        match expr {
            Expr::Literal(lit) => {
                self.writeln(&format!("li $a0, {}", notes.literal(lit)));
            }

            Expr::Var(var) => {
                self.generate_address(var, notes);
                self.writeln("lw $a0, 0($a0)");
            }

            Expr::Assign { target, value, .. } => {
                self.generate_address(target, notes);
                self.push();
                self.generate_expr(value, notes);
                self.writeln("lw $t1, 4($sp)");
                self.writeln("sw $a0, 0($t1)");
                self.writeln(&format!("addiu $sp, $sp, {}", WORD_SIZE));
            }

            Expr::Binary { left, op, right, .. } => {
                self.generate_expr(left, notes);
                self.push();
                self.generate_expr(right, notes);
                self.writeln("lw $t1, 4($sp)");
                match op {
                    BinOp::Mul => {
                        self.writeln("mult $t1, $a0");
                        self.writeln("mflo $a0");
                    }
                    BinOp::Div => {
                        self.writeln("div $t1, $a0");
                        self.writeln("mflo $a0");
                    }
                    _ => self.writeln(&format!("{} $a0, $t1, $a0", mnemonic(*op))),
                }
                self.writeln(&format!("addiu $sp, $sp, {}", WORD_SIZE));
            }

            Expr::Call { callee, args, .. } => {
                self.writeln("sw $fp, 0($sp)");
                self.writeln(&format!("addiu $sp, $sp, -{}", WORD_SIZE));

                // last argument first, so argument i lands at parameter_offset(i) from the callee's $fp
                for arg in args.iter().rev() {
                    self.generate_argument(arg, notes);
                    self.push();
                }

                self.writeln(&format!("jal _f_{}", callee.name));
                // the arguments plus the saved $fp slot
                self.writeln(&format!("addiu $sp, $sp, {}", parameter_offset(args.len())));
                self.writeln("lw $fp, 0($sp)");
            }
        }
    }

    /// Arrays are passed by address
    fn generate_argument(&mut self, arg: &Expr, notes: &Annotations) {
        let var = match arg {
            Expr::Var(var) if var.index.is_none() => var,
            _ => return self.generate_expr(arg, notes),
        };

        let info = notes.var(var);
        match info.prim {
            PrimitiveType::Array if info.is_global() => {
                self.writeln(&format!("la $a0, _v_{}", var.name.name));
            }
            PrimitiveType::Array => {
                self.writeln(&format!("addi $a0, $fp, {}", info.offset));
            }
            PrimitiveType::Pointer => {
                self.writeln(&format!("addi $a0, $fp, {}", info.offset));
                self.writeln("lw $a0, 0($a0)");
            }
            _ => self.generate_expr(arg, notes),
        }
    }

    /// Leave the address of a (possibly subscripted) variable in `$a0`
    fn generate_address(&mut self, var: &VarRef, notes: &Annotations) {
        let info = notes.var(var);

        if let Some(index) = &var.index {
            self.generate_expr(index, notes);
            self.writeln("sll $a0, $a0, 2");
            self.writeln("move $t1, $a0");
        }

        if info.prim == PrimitiveType::Pointer {
            self.writeln(&format!("addi $a0, $fp, {}", info.offset));
            self.writeln("lw $a0, 0($a0)");
        } else if info.is_global() {
            self.writeln(&format!("la $a0, _v_{}", var.name.name));
        } else {
            self.writeln(&format!("addi $a0, $fp, {}", info.offset));
        }

        if var.index.is_some() {
            self.writeln("add $a0, $t1, $a0");
        }
    }
}

/// Three-register instruction for a non-multiplicative operator
fn mnemonic(op: BinOp) -> &'static str {
    match op {
        BinOp::Le => "sle",
        BinOp::Lt => "slt",
        BinOp::Gt => "sgt",
        BinOp::Ge => "sge",
        BinOp::Eq => "seq",
        BinOp::Ne => "sne",
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mult",
        BinOp::Div => "div",
    }
}

impl Default for MipsCodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen for MipsCodeGen {
    fn generate(&mut self, checked: &CheckedProgram) -> String {
        self.output.clear();
        self.segment = Segment::Text;
        self.label_counter = 0;

        let notes = checked.notes();
        self.write_raw(BUILTINS);
        for decl in &checked.program().decls {
            match decl {
                Decl::Var(var) => self.generate_global(var, notes),
                Decl::Fun(fun) => self.generate_function(fun, notes),
            }
        }

        self.switch_to(Segment::Text);
        self.write_raw(ENTRY);
        std::mem::take(&mut self.output)
    }

    fn target(&self) -> &str {
        "mips32-spim"
    }

    fn name(&self) -> &str {
        "MIPS"
    }
}

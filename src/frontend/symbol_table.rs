//! Symbol table with nested scopes
//!
//! Scopes form a stack: the root (global) scope at the bottom, the
//! innermost scope on top. Each scope owns an [`IdTable`] of symbols and
//! the running frame counters used to hand out storage offsets.

use std::fmt;

use crate::frontend::ast::Ident;
use crate::frontend::id_table::{IdTable, IdTableError};
use crate::types::{parameter_offset, PrimitiveType, Type, WORD_SIZE};
use crate::utils::{Error, Result};

/// A declared name
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub ty: Type,
    /// Frame displacement; 0 for root-scope symbols, which are addressed by name
    pub offset: i32,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.ty, self.offset)
    }
}

/// Storage request made when defining a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// `words` stack slots below the frame pointer
    Local { words: u32 },
    /// One incoming-argument slot above the frame pointer
    Param,
}

/// A scope containing symbols
#[derive(Debug)]
struct Scope {
    depth: usize,
    symbols: IdTable<Symbol>,
    /// Lowest local displacement handed out so far (inherited from the parent)
    varmax: i32,
    /// Highest parameter displacement handed out so far
    parmax: i32,
}

/// Symbol table with nested scopes
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    /// A table holding only the root scope and the `input`/`output` built-ins
    pub fn new() -> Self {
        let mut table = Self {
            scopes: vec![Scope {
                depth: 0,
                symbols: IdTable::new(),
                varmax: 0,
                parmax: 0,
            }],
        };
        table.register_builtins();
        table
    }

    fn register_builtins(&mut self) {
        let builtins = [
            ("input", PrimitiveType::Int, PrimitiveType::Void),
            ("output", PrimitiveType::Void, PrimitiveType::Int),
        ];
        for (name, ret, param) in builtins {
            let ty = Type::signature(ret, &[param]);
            self.root_mut()
                .symbols
                .insert(name, Symbol { ty, offset: 0 })
                .expect("builtins are distinct and go into an empty root scope");
        }
    }

    fn root_mut(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    fn current(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Depth of the innermost scope (0 = root)
    pub fn depth(&self) -> usize {
        self.current().depth
    }

    /// Enter a new scope nested in the current one
    pub fn enter_scope(&mut self) {
        let parent = self.current();
        let scope = Scope {
            depth: parent.depth + 1,
            symbols: IdTable::new(),
            varmax: parent.varmax,
            parmax: 0,
        };
        log::debug!("enter scope {}", scope.depth);
        self.scopes.push(scope);
    }

    /// Exit the current scope, dropping its symbols. The root scope is never popped.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            if let Some(scope) = self.scopes.pop() {
                log::debug!("exit scope {} ({} symbols)", scope.depth, scope.symbols.len());
                log::trace!("scope {} contents:\n{}", scope.depth, scope.symbols);
            }
        }
    }

    /// Lowest local displacement of the current scope
    pub fn varmax(&self) -> i32 {
        self.current().varmax
    }

    /// Define a symbol in the current scope and return its offset
    pub fn define(&mut self, ident: &Ident, ty: Type, alloc: Allocation) -> Result<i32> {
        let is_root = self.scopes.len() == 1;
        let scope = self.current_mut();

        let offset = if is_root {
            0
        } else {
            match alloc {
                Allocation::Local { words } if words > 0 => {
                    let varmax = i32::try_from(words)
                        .ok()
                        .and_then(|words| words.checked_mul(WORD_SIZE))
                        .and_then(|bytes| scope.varmax.checked_sub(bytes))
                        .ok_or_else(|| {
                            Error::InternalError(format!(
                                "stack frame exhausted defining '{}'",
                                ident.name
                            ))
                        })?;
                    scope.varmax = varmax;
                    varmax
                }
                Allocation::Param => {
                    let position = (scope.parmax / WORD_SIZE) as usize;
                    scope.parmax = parameter_offset(position);
                    scope.parmax
                }
                Allocation::Local { .. } => {
                    return Err(Error::InternalError(format!(
                        "zero-sized storage requested for '{}'",
                        ident.name
                    )))
                }
            }
        };

        Self::insert(&mut scope.symbols, ident, Symbol { ty, offset })?;
        Ok(offset)
    }

    /// Define a symbol in the root scope, whatever the current depth
    pub fn define_global(&mut self, ident: &Ident, ty: Type) -> Result<()> {
        Self::insert(&mut self.root_mut().symbols, ident, Symbol { ty, offset: 0 })
    }

    fn insert(symbols: &mut IdTable<Symbol>, ident: &Ident, symbol: Symbol) -> Result<()> {
        log::debug!("define {}: {}", ident.name, symbol);
        symbols.insert(&ident.name, symbol).map_err(|err| match err {
            IdTableError::Duplicate(name) => Error::Redeclaration {
                name,
                span: ident.span,
            },
            IdTableError::Exhausted => Error::InternalError(err.to_string()),
        })
    }

    /// Look up a name, innermost scope first; also returns the depth it was found at
    pub fn lookup(&self, name: &str) -> Option<(&Symbol, usize)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name).map(|symbol| (symbol, scope.depth)))
    }

    /// Look up an identifier, failing with `UndeclaredSymbol`
    pub fn resolve(&self, ident: &Ident) -> Result<&Symbol> {
        self.lookup(&ident.name)
            .map(|(symbol, _)| symbol)
            .ok_or_else(|| Error::UndeclaredSymbol {
                name: ident.name.clone(),
                span: ident.span,
            })
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Span;

    fn ident(name: &str) -> Ident {
        Ident::new(name, Span::dummy())
    }

    fn int() -> Type {
        Type::variable(PrimitiveType::Int)
    }

    #[test]
    fn test_builtins() {
        let table = SymbolTable::new();
        let (input, depth) = table.lookup("input").unwrap();
        assert_eq!(depth, 0);
        assert_eq!(input.ty.to_string(), "int(void)");
        let (output, _) = table.lookup("output").unwrap();
        assert_eq!(output.ty.to_string(), "void(int)");
    }

    #[test]
    fn test_root_offsets_are_zero() {
        let mut table = SymbolTable::new();
        let offset = table.define(&ident("g"), int(), Allocation::Local { words: 1 }).unwrap();
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_local_and_param_offsets() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        assert_eq!(table.define(&ident("a"), int(), Allocation::Param).unwrap(), parameter_offset(0));
        assert_eq!(table.define(&ident("b"), int(), Allocation::Param).unwrap(), parameter_offset(1));
        assert_eq!(table.define(&ident("x"), int(), Allocation::Local { words: 1 }).unwrap(), -4);
        assert_eq!(
            table
                .define(&ident("arr"), Type::variable(PrimitiveType::Array), Allocation::Local { words: 10 })
                .unwrap(),
            -44
        );

        // nested scopes keep consuming the same frame, parameters restart
        table.enter_scope();
        assert_eq!(table.define(&ident("y"), int(), Allocation::Local { words: 1 }).unwrap(), -48);
        assert_eq!(table.define(&ident("p"), int(), Allocation::Param).unwrap(), 4);
    }

    #[test]
    fn test_zero_word_local_is_internal_error() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        let err = table.define(&ident("x"), int(), Allocation::Local { words: 0 }).unwrap_err();
        assert!(matches!(err, Error::InternalError(_)));
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.define(&ident("x"), int(), Allocation::Local { words: 1 }).unwrap();
        let err = table.define(&ident("x"), int(), Allocation::Local { words: 1 }).unwrap_err();
        assert!(matches!(err, Error::Redeclaration { ref name, .. } if name == "x"));
    }

    #[test]
    fn test_shadowing() {
        let mut table = SymbolTable::new();
        table.define(&ident("x"), int(), Allocation::Local { words: 1 }).unwrap();
        table.enter_scope();
        table
            .define(&ident("x"), Type::variable(PrimitiveType::Array), Allocation::Local { words: 2 })
            .unwrap();

        let (inner, depth) = table.lookup("x").unwrap();
        assert_eq!(depth, 1);
        assert_eq!(inner.ty, Type::variable(PrimitiveType::Array));
        assert_eq!(inner.offset, -8);

        table.exit_scope();
        let (outer, depth) = table.lookup("x").unwrap();
        assert_eq!(depth, 0);
        assert_eq!(outer.offset, 0);
    }

    #[test]
    fn test_globals_go_to_root() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.enter_scope();
        table.define_global(&ident("f"), Type::function(PrimitiveType::Void)).unwrap();
        table.exit_scope();
        table.exit_scope();
        assert_eq!(table.lookup("f").map(|(_, depth)| depth), Some(0));

        let err = table.define_global(&ident("output"), Type::function(PrimitiveType::Void)).unwrap_err();
        assert!(matches!(err, Error::Redeclaration { .. }));
    }

    #[test]
    fn test_undeclared() {
        let table = SymbolTable::new();
        let err = table.resolve(&ident("nope")).unwrap_err();
        assert!(matches!(err, Error::UndeclaredSymbol { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_root_is_never_popped() {
        let mut table = SymbolTable::new();
        table.exit_scope();
        assert_eq!(table.depth(), 0);
        assert!(table.lookup("input").is_some());
    }

    #[test]
    fn test_many_symbols_in_one_scope() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        for i in 0..200 {
            table.define(&ident(&format!("v{}", i)), int(), Allocation::Local { words: 1 }).unwrap();
        }
        for i in 0..200 {
            let (symbol, _) = table.lookup(&format!("v{}", i)).unwrap();
            assert_eq!(symbol.offset, -4 * (i + 1));
        }
    }

    #[test]
    fn test_full_scope_is_fatal() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        let mut defined = 0;
        let err = loop {
            match table.define(&ident(&format!("v{}", defined)), int(), Allocation::Local { words: 1 }) {
                Ok(_) => defined += 1,
                Err(err) => break err,
            }
            assert!(defined < 10_000, "scope never filled up");
        };
        assert!(defined > 5000);
        assert!(matches!(err, Error::InternalError(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_frame_exhaustion_is_fatal() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        let half = Allocation::Local { words: 500_000_000 };
        let array = Type::variable(PrimitiveType::Array);
        assert_eq!(table.define(&ident("a"), array.clone(), half).unwrap(), -2_000_000_000);

        let err = table.define(&ident("b"), array.clone(), half).unwrap_err();
        assert!(matches!(err, Error::InternalError(ref message) if message.contains("'b'")));
        assert!(err.is_fatal());
        assert_eq!(table.varmax(), -2_000_000_000);

        let err = table.define(&ident("c"), array, Allocation::Local { words: u32::MAX }).unwrap_err();
        assert!(err.is_fatal());
    }
}

//! Type System for C-minus

use std::fmt;

use serde::Serialize;

use crate::frontend::ast::{Declarator, TypeSpec};
use crate::utils::{Error, Result};

/// Size of an `int`, a pointer and a stack slot, in bytes
pub const WORD_SIZE: i32 = 4;

/// Frame displacement of the parameter at `position` (0-based).
///
/// The caller pushes arguments last-to-first, then the callee saves `$ra`
/// in the slot right below them and points `$fp` at it. Parameter `n`
/// therefore sits `n + 1` words above the frame pointer, which is also what
/// the symbol table hands out for successive parameter allocations.
pub fn parameter_offset(position: usize) -> i32 {
    (position as i32 + 1) * WORD_SIZE
}

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    Int,
    Void,
    /// `int x[N]`: storage owned by the declaring scope
    Array,
    /// `int x[]`: a parameter holding an array address
    Pointer,
}

/// Where a declarator appears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Variable,
    Parameter,
}

impl PrimitiveType {
    /// Map a type specifier and its declarator to a primitive
    pub fn of(spec: TypeSpec, declarator: &Declarator, position: Position) -> Result<Self> {
        match (spec, declarator, position) {
            (TypeSpec::Void, _, _) => Ok(Self::Void),
            (TypeSpec::Int, Declarator::Scalar, _) => Ok(Self::Int),
            (TypeSpec::Int, Declarator::Array(_), Position::Variable) => Ok(Self::Array),
            (TypeSpec::Int, Declarator::Pointer, Position::Parameter) => Ok(Self::Pointer),
            (TypeSpec::Int, Declarator::Array(_), Position::Parameter) => Err(Error::InvalidAstShape(
                "sized array declarator in parameter position".to_string(),
            )),
            (TypeSpec::Int, Declarator::Pointer, Position::Variable) => Err(Error::InvalidAstShape(
                "pointer declarator outside parameter position".to_string(),
            )),
        }
    }

    /// Primitive for a function return type
    pub fn returned(spec: TypeSpec) -> Self {
        match spec {
            TypeSpec::Int => Self::Int,
            TypeSpec::Void => Self::Void,
        }
    }

    /// Equality with array-to-pointer decay: Array and Pointer are interchangeable
    pub fn equivalent(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Array, Self::Pointer) | (Self::Pointer, Self::Array)
        ) || self == other
    }

    /// Does a value of this type name array storage?
    pub fn is_aggregate(self) -> bool {
        self.equivalent(Self::Array)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Void => "void",
            Self::Array => "int[#]",
            Self::Pointer => "int[]",
        })
    }
}

/// Function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub ret: PrimitiveType,
    /// A lone `Void` entry stands for `(void)`
    pub params: Vec<PrimitiveType>,
}

impl FunctionType {
    /// Number of arguments a call must supply
    pub fn arity(&self) -> usize {
        if self.params == [PrimitiveType::Void] {
            0
        } else {
            self.params.len()
        }
    }

    /// Parameters a call must supply, `(void)` being empty
    pub fn expected_args(&self) -> &[PrimitiveType] {
        if self.arity() == 0 {
            &[]
        } else {
            &self.params
        }
    }
}

/// Declared type of a symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Variable(PrimitiveType),
    Function(FunctionType),
}

impl Type {
    pub fn variable(prim: PrimitiveType) -> Self {
        Self::Variable(prim)
    }

    /// A function returning `ret` with no parameters yet
    pub fn function(ret: PrimitiveType) -> Self {
        Self::Function(FunctionType {
            ret,
            params: Vec::new(),
        })
    }

    /// Append one parameter to a function type
    pub fn takes(&mut self, param: PrimitiveType) -> Result<&mut Self> {
        match self {
            Self::Function(func) => {
                func.params.push(param);
                Ok(self)
            }
            Self::Variable(_) => Err(Error::InternalError(
                "parameter appended to a variable type".to_string(),
            )),
        }
    }

    /// A complete function signature
    pub fn signature(ret: PrimitiveType, params: &[PrimitiveType]) -> Self {
        Self::Function(FunctionType {
            ret,
            params: params.to_vec(),
        })
    }

    /// `void main(void)`
    pub fn void_main() -> Self {
        Self::signature(PrimitiveType::Void, &[PrimitiveType::Void])
    }

    /// Type equality; primitives compare with [`PrimitiveType::equivalent`]
    pub fn equivalent(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Variable(a), Self::Variable(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => {
                a.ret.equivalent(b.ret)
                    && a.params.len() == b.params.len()
                    && a.params.iter().zip(&b.params).all(|(x, y)| x.equivalent(*y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(prim) => write!(f, "{}", prim),
            Self::Function(func) => {
                let params: Vec<String> = func.params.iter().map(|p| p.to_string()).collect();
                write!(f, "{}({})", func.ret, params.join(", "))
            }
        }
    }
}

//! Backend module - Code generation

pub mod codegen;

pub mod mips;

pub use codegen::CodeGen;
pub use mips::MipsCodeGen;

//! MIPS Backend - Generate SPIM assembly from a checked program

mod mips_codegen;

pub use mips_codegen::MipsCodeGen;

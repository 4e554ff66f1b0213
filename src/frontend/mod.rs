//! Frontend module - Lexer, Parser, Semantic Analysis

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod id_table;
pub mod symbol_table;
pub mod semantic;
pub mod checked;

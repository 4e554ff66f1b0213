//! Code Generation trait - Backend abstraction

use crate::frontend::checked::CheckedProgram;

/// Code generation backend trait
///
/// Backends only ever see programs that passed semantic checking, so
/// generation itself cannot fail.
pub trait CodeGen {
    /// Generate assembly text for a checked program
    fn generate(&mut self, program: &CheckedProgram) -> String;

    /// Target the output is meant for (e.g., "mips32-spim")
    fn target(&self) -> &str;

    /// Get the backend name
    fn name(&self) -> &str;
}

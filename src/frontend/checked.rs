//! Checker output
//!
//! The AST stays immutable; everything the checker learns is recorded in an
//! [`Annotations`] side table keyed by [`NodeId`]. A [`CheckedProgram`] can
//! only be built by the checker, so holding one proves the tree passed.

use std::collections::HashMap;

use crate::frontend::ast::{Block, Literal, NodeId, Program, VarRef};
use crate::types::PrimitiveType;

/// Storage facts for a declaration or a variable reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInfo {
    pub prim: PrimitiveType,
    /// Frame displacement; 0 means a global addressed by label
    pub offset: i32,
}

impl VarInfo {
    pub fn is_global(&self) -> bool {
        self.offset == 0
    }
}

/// Facts attached to AST nodes by the checker
#[derive(Debug, Default)]
pub struct Annotations {
    literals: HashMap<NodeId, i32>,
    vars: HashMap<NodeId, VarInfo>,
    frames: HashMap<NodeId, i32>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_literal(&mut self, id: NodeId, value: i32) {
        self.literals.insert(id, value);
    }

    pub(crate) fn set_var(&mut self, id: NodeId, info: VarInfo) {
        self.vars.insert(id, info);
    }

    pub(crate) fn set_frame(&mut self, id: NodeId, adjustment: i32) {
        self.frames.insert(id, adjustment);
    }

    /// Value of a checked literal.
    ///
    /// # Panics
    /// If the literal was never checked.
    pub fn literal(&self, lit: &Literal) -> i32 {
        match self.literals.get(&lit.id) {
            Some(value) => *value,
            None => panic!("literal {:?} has no recorded value", lit.id),
        }
    }

    /// Resolved storage of a variable reference
    ///
    /// # Panics
    /// If the reference was never checked.
    pub fn var(&self, var: &VarRef) -> VarInfo {
        self.var_by_id(var.id)
    }

    /// Storage of any annotated declaration or reference
    pub fn var_by_id(&self, id: NodeId) -> VarInfo {
        match self.vars.get(&id) {
            Some(info) => *info,
            None => panic!("node {:?} has no recorded storage", id),
        }
    }

    /// Stack adjustment of a block (zero or negative, in bytes)
    ///
    /// # Panics
    /// If the block was never checked.
    pub fn frame(&self, block: &Block) -> i32 {
        match self.frames.get(&block.id) {
            Some(adjustment) => *adjustment,
            None => panic!("block {:?} has no recorded frame", block.id),
        }
    }
}

/// A program that passed semantic checking, with its annotations
#[derive(Debug)]
pub struct CheckedProgram {
    program: Program,
    notes: Annotations,
}

impl CheckedProgram {
    pub(crate) fn new(program: Program, notes: Annotations) -> Self {
        Self { program, notes }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn notes(&self) -> &Annotations {
        &self.notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Span;

    #[test]
    fn test_lookup_by_node() {
        let lit = Literal {
            id: NodeId(3),
            text: "7".to_string(),
            span: Span::dummy(),
        };
        let mut notes = Annotations::new();
        notes.set_literal(lit.id, 7);
        notes.set_var(NodeId(4), VarInfo { prim: PrimitiveType::Int, offset: -4 });

        assert_eq!(notes.literal(&lit), 7);
        assert_eq!(notes.var_by_id(NodeId(4)).offset, -4);
        assert!(!notes.var_by_id(NodeId(4)).is_global());
    }

    #[test]
    #[should_panic(expected = "no recorded value")]
    fn test_missing_literal_panics() {
        let lit = Literal {
            id: NodeId(9),
            text: "1".to_string(),
            span: Span::dummy(),
        };
        Annotations::new().literal(&lit);
    }
}

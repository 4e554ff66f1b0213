//! Error handling for the C-minus compiler

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
///
/// Every stage stops at its first failure and hands back exactly one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer / Parser Errors ====================

    #[error("Unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Invalid character '{ch}'")]
    InvalidCharacter { ch: char, span: Span },

    #[error("Unterminated comment")]
    UnterminatedComment { span: Span },

    // ==================== Semantic Errors ====================

    #[error("Type error: {message}")]
    TypeError { message: String, span: Span },

    #[error("Redeclaration of '{name}'")]
    Redeclaration { name: String, span: Span },

    #[error("Function '{name}' returns a value but has no return statement")]
    ReturnTypeError { name: String, span: Span },

    #[error("Undeclared symbol: {name}")]
    UndeclaredSymbol { name: String, span: Span },

    #[error("Variable '{name}' declared void")]
    VoidVariable { name: String, span: Span },

    #[error("The final declaration must be 'void main(void)'")]
    MissingMainContract { span: Span },

    #[error("Internal compiler error: {0}")]
    InternalError(String),

    #[error("Malformed syntax tree: {0}")]
    InvalidAstShape(String),

    #[error("Argument count mismatch calling '{name}': expected {expected}, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Integer literal out of range: {text}")]
    BadLiteralValue { text: String, span: Span },
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::InvalidCharacter { span, .. } => Some(*span),
            Self::UnterminatedComment { span } => Some(*span),
            Self::TypeError { span, .. } => Some(*span),
            Self::Redeclaration { span, .. } => Some(*span),
            Self::ReturnTypeError { span, .. } => Some(*span),
            Self::UndeclaredSymbol { span, .. } => Some(*span),
            Self::VoidVariable { span, .. } => Some(*span),
            Self::MissingMainContract { span } => Some(*span),
            Self::ArityMismatch { span, .. } => Some(*span),
            Self::BadLiteralValue { span, .. } => Some(*span),
            Self::InternalError(_) | Self::InvalidAstShape(_) => None,
        }
    }

    /// Stable numeric code of a semantic error (1..=10), `None` for front-end errors
    pub fn code(&self) -> Option<u8> {
        match self {
            Self::TypeError { .. } => Some(1),
            Self::Redeclaration { .. } => Some(2),
            Self::ReturnTypeError { .. } => Some(3),
            Self::UndeclaredSymbol { .. } => Some(4),
            Self::VoidVariable { .. } => Some(5),
            Self::MissingMainContract { .. } => Some(6),
            Self::InternalError(_) => Some(7),
            Self::InvalidAstShape(_) => Some(8),
            Self::ArityMismatch { .. } => Some(9),
            Self::BadLiteralValue { .. } => Some(10),
            _ => None,
        }
    }

    /// Fatal conditions are compiler bugs or resource exhaustion, never user mistakes
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalError(_) | Self::InvalidAstShape(_))
    }

    pub(crate) fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::TypeError {
            message: message.into(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let span = Span::dummy();
        let errors = vec![
            Error::type_error("x", span),
            Error::Redeclaration { name: "f".into(), span },
            Error::ReturnTypeError { name: "f".into(), span },
            Error::UndeclaredSymbol { name: "y".into(), span },
            Error::VoidVariable { name: "v".into(), span },
            Error::MissingMainContract { span },
            Error::InternalError("boom".into()),
            Error::InvalidAstShape("bad".into()),
            Error::ArityMismatch { name: "g".into(), expected: 1, got: 2, span },
            Error::BadLiteralValue { text: "9999999999".into(), span },
        ];
        let codes: Vec<u8> = errors.iter().filter_map(Error::code).collect();
        assert_eq!(codes, (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::InternalError("table full".into()).is_fatal());
        assert!(Error::InvalidAstShape("bad".into()).is_fatal());
        assert!(!Error::MissingMainContract { span: Span::dummy() }.is_fatal());
        assert!(Error::UnterminatedComment { span: Span::dummy() }.code().is_none());
    }
}

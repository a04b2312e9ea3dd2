use crate::span::Span;
use std::sync::Arc;
use thiserror::Error;

/// Location and context of a failure in textual input
#[derive(Debug, Clone, PartialEq)]
pub struct ParseErrorDetails {
    pub message: String,
    pub span: Span,
    pub source_id: String,
    pub source_text: Arc<str>,
    pub suggestion: Option<String>,
}

/// Error types for building, compiling and invoking expressions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MastError {
    /// An operation name in the tree has no implementation in the bound algebra
    #[error("Unsupported {arity} operation '{operation}'")]
    UnsupportedOperation { operation: String, arity: Arity },

    /// A free variable has neither a binding nor an algebra fallback
    #[error("Unbound symbol '{0}'")]
    UnboundSymbol(String),

    /// A lowered program broke its single-assignment discipline.
    /// This is a bug in the lowering pass, never a user error.
    #[error("Malformed program: {0}")]
    MalformedProgram(String),

    /// An algebra operation rejected its operands at run time
    #[error("Domain error: {0}")]
    Domain(String),

    /// Textual expression could not be parsed
    #[error("{}", format_parse_error(.0))]
    Parse(Box<ParseErrorDetails>),

    /// A configured limit was exceeded
    #[error("Resource limit exceeded: {limit_name} (limit: {limit_value}, actual: {actual_value}). {suggestion}")]
    ResourceLimitExceeded {
        limit_name: String,
        limit_value: String,
        actual_value: String,
        suggestion: String,
    },

    /// The native code generator refused the emitted module
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Number of operands of an operation, used for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Unary,
    Binary,
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Unary => write!(f, "unary"),
            Arity::Binary => write!(f, "binary"),
        }
    }
}

impl MastError {
    pub fn unsupported_unary(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            arity: Arity::Unary,
        }
    }

    pub fn unsupported_binary(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            arity: Arity::Binary,
        }
    }

    /// Create a parse error with source information
    pub fn parse(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
    ) -> Self {
        Self::Parse(Box::new(ParseErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: None,
        }))
    }

    /// Create a parse error with suggestion
    pub fn parse_with_suggestion(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Parse(Box::new(ParseErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: Some(suggestion.into()),
        }))
    }

    /// Name of the operation, for `UnsupportedOperation` errors
    pub fn operation(&self) -> Option<&str> {
        match self {
            MastError::UnsupportedOperation { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

fn format_parse_error(details: &ParseErrorDetails) -> String {
    let mut message = format!("Parse error: {}", details.message);
    if let Some(suggestion) = &details.suggestion {
        message.push_str(&format!(" (suggestion: {})", suggestion));
    }
    message.push_str(&format!(
        " at {}:{}:{}",
        details.source_id, details.span.line, details.span.col
    ));
    message
}

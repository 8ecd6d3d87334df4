//! Error types for the compiler and the VM
//!
//! Two classes of failure live here. `JsError` is produced while turning
//! source text into a `Code` object and prevents the Code from existing.
//! `FatalError` reports a broken VM or compiler invariant during a run.
//! Language-level throws are neither: they travel as completions.

use thiserror::Error;

/// Source location information for error messages
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Compile-time error
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsError {
    #[error("SyntaxError: {message} at {location}")]
    SyntaxError {
        message: String,
        location: SourceLocation,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JsError {
    pub fn syntax_error(message: impl Into<String>, line: u32, column: u32) -> Self {
        JsError::SyntaxError {
            message: message.into(),
            location: SourceLocation { line, column },
        }
    }

    /// Create an internal error for compiler limits that should never be hit
    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    /// The message without the error kind prefix
    pub fn message(&self) -> &str {
        match self {
            JsError::SyntaxError { message, .. } => message,
            JsError::Internal(message) => message,
        }
    }
}

/// Unrecoverable VM failure
///
/// Any of these means the compiler emitted bytecode the VM cannot execute,
/// or the VM itself broke an invariant. Guest code can never catch them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FatalError {
    #[error("operand stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },

    #[error("expected {expected} on the operand stack at pc {pc}")]
    UnexpectedStackItem { expected: &'static str, pc: usize },

    #[error("execution fell off the end of code '{name}'")]
    FellOffEnd { name: String },

    #[error("binding '{name}' is missing from its environment record")]
    MissingBinding { name: String },

    #[error("binding '{name}' was created twice in one environment record")]
    DuplicateBinding { name: String },

    #[error("jump target {target} is out of range at pc {pc}")]
    InvalidJumpTarget { target: usize, pc: usize },

    #[error("{0}")]
    Invariant(String),
}

//! Error types for the script execution core

use thiserror::Error;

/// Main error type for the execution core.
///
/// Every variant carries enough context to produce a precise diagnostic:
/// target names, property names, and for bounds errors both the offending
/// index and the valid bound. All errors are returned as values up the
/// evaluation chain; the embedding host decides whether to surface them as
/// guest-language exceptions.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("cannot assign to externally bound variable '{name}'")]
    UnsupportedExternalAssignment { name: String },

    #[error("value {value} is out of range {lo}..{hi} for '{type_name}'")]
    SubrangeOutOfRange {
        type_name: String,
        value: i64,
        lo: i64,
        hi: i64,
    },

    #[error("cannot assign to member '{member}' of {kind}")]
    MemberAssignmentUnsupported { kind: &'static str, member: String },

    #[error("index {index} out of bounds {lo}..{hi}")]
    IndexOutOfBounds { index: i64, lo: i64, hi: i64 },

    #[error("string element assignment requires exactly one character, got '{got}'")]
    InvalidCharacterAssignment { got: String },

    #[error("value of type {type_name} is not indexable")]
    NotIndexable { type_name: String },

    #[error("property '{property}' is read-only")]
    PropertyReadOnly { property: String },

    #[error(
        "property '{property}' accessor '{accessor}' expects {expected} argument(s), got {got}"
    )]
    PropertySignatureMismatch {
        property: String,
        accessor: String,
        expected: usize,
        got: usize,
    },

    #[error("circular reference while evaluating property '{property}'")]
    CircularPropertyReference { property: String },

    #[error("stack overflow: call depth exceeded {max_depth} frames in '{routine}'")]
    StackOverflow { routine: String, max_depth: usize },

    #[error("type mismatch: operator '{op}' not supported for {left} and {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("'{name}' is not callable")]
    NotCallable { name: String },

    #[error("routine '{routine}' expects {expected} argument(s), got {got}")]
    ArgumentCountMismatch {
        routine: String,
        expected: usize,
        got: usize,
    },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("{0}")]
    Unsupported(String),

    /// Marker error indicating a guest exception is in flight (the raised
    /// value lives in the execution context's active-exception slot).
    #[error("unhandled script exception")]
    Raised,
}

impl ExecError {
    pub fn undefined(name: impl Into<String>) -> Self {
        ExecError::UndefinedVariable { name: name.into() }
    }

    pub fn type_mismatch(
        op: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        ExecError::TypeMismatch {
            op: op.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn not_callable(name: impl Into<String>) -> Self {
        ExecError::NotCallable { name: name.into() }
    }

    pub fn unknown_type(name: impl Into<String>) -> Self {
        ExecError::UnknownType { name: name.into() }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        ExecError::Unsupported(message.into())
    }

    /// True for the in-flight guest exception marker. The surrounding
    /// try/except machinery is the only consumer; every other error kind
    /// propagates to the host unchanged.
    pub fn is_raised(&self) -> bool {
        matches!(self, ExecError::Raised)
    }
}

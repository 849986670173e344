//! Error types for label parsing and injection.

use thiserror::Error;

/// Result type alias for label operations.
pub type LabelResult<T> = Result<T, LabelError>;

/// Errors raised while validating an extra-labels fragment or rewriting
/// an exposition block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("invalid label name {name:?}")]
    InvalidName { name: String },

    #[error("missing `=` after {tail:?}")]
    MissingEquals { tail: String },

    #[error("missing opening `\"` for {name:?} value; tail={tail:?}")]
    UnquotedValue { name: String, tail: String },

    #[error("missing closing `\"` for {name:?} value; tail={tail:?}")]
    UnterminatedValue { name: String, tail: String },

    #[error("missing `,` after {name:?} value; tail={tail:?}")]
    MissingComma { name: String, tail: String },

    #[error("trailing `,` in extra labels")]
    TrailingComma,

    /// The snapshot contained a line with neither a label set nor a
    /// name/value separator. This is a bug in the snapshot producer.
    #[error("missing whitespace in exposition line {line:?}")]
    MalformedLine { line: String },
}

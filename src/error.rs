//! Error types for the expression engine
//!
//! One taxonomy covers both phases: the parser reports syntax failures with
//! the input tail where scanning stopped, and the evaluator reports argument
//! and lookup failures. Evaluation failures never abort a whole render; the
//! dispatch layer flattens them into an empty series list.

use thiserror::Error;

/// Failure tags shared by the parser and the evaluator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input ended where an expression was required
    #[error("missing expression")]
    MissingExpr,

    /// A required argument is absent
    #[error("missing argument")]
    MissingArgument,

    /// An argument list ended without a closing parenthesis
    #[error("missing comma")]
    MissingComma,

    /// A string literal has no closing quote
    #[error("missing quote")]
    MissingQuote,

    /// A byte that fits no production of the grammar
    #[error("unexpected character")]
    UnexpectedCharacter,

    /// An argument has the wrong expression type
    #[error("bad type")]
    BadType,

    /// An argument that must evaluate to series produced none
    #[error("missing time series")]
    MissingTimeseries,
}

/// Parse failure plus the unconsumed input tail.
///
/// The tail starts at the offending byte, so callers can point at exactly
/// where scanning stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at {remainder:?}")]
pub struct ParseError<'a> {
    /// What went wrong
    pub kind: ErrorKind,
    /// Input from the offending byte onward
    pub remainder: &'a str,
}

/// Result type alias for evaluator-internal helpers
pub type EvalResult<T> = std::result::Result<T, ErrorKind>;

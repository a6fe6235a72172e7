//! Construction-time errors.
//!
//! Numerical trouble met while tracking (singular Jacobians, insufficient
//! precision, divergence) is reported through
//! [`SuccessCode`](crate::tracking::SuccessCode) instead; the variants here
//! describe malformed input that no amount of retrying can fix.

use thiserror::Error;

/// Errors raised while building or querying expressions, systems and configurations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Expression is not polynomial in the requested variables: {0}")]
    NonPolynomial(String),

    #[error("Cannot homogenize a linear product with respect to part of its variables")]
    PartialGroupOverlap,

    #[error("`{0}` is not a variable")]
    NotAVariable(String),

    #[error("Invalid homogenization request: {0}")]
    InvalidHomogenization(String),

    #[error("Coefficient matrix has {found} columns, expected {expected} (one per variable plus a constant)")]
    CoefficientDimensionMismatch { expected: usize, found: usize },

    #[error("Size mismatch: expected {expected}, got {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("System has no path variable")]
    MissingPathVariable,

    #[error("System has no projective variable groups to patch")]
    NoProjectiveGroups,

    #[error("System is not square: {functions} functions in {variables} variables")]
    NotSquare { functions: usize, variables: usize },

    #[error("Index {index} out of range for {count} entries")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown symbol `{0}`")]
    UnknownSymbol(String),

    #[error("Invalid numeric literal `{0}`")]
    InvalidLiteral(String),

    #[error("Systems cannot be combined: {0}")]
    IncompatibleSystems(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for fallible construction.
pub type Result<T> = std::result::Result<T, Error>;

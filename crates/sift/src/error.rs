//! Error types for the sift crate.
//!
//! Every variant is a configuration error: the description handed to the
//! engine is malformed. Missing or oddly shaped record data is never an
//! error, it simply counts as "no value".

use thiserror::Error;

/// Errors raised while compiling or loading a description.
#[derive(Debug, Error)]
pub enum SiftError {
    /// Condition tag not recognized.
    #[error("unknown condition operator '{0}'")]
    UnknownOperator(String),

    /// Operand has the wrong shape for the operator it is attached to.
    #[error("operator '{op}' expects {expected}, got {actual}")]
    InvalidOperand {
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    /// Bucket interval must be a positive, finite number.
    #[error("bucket interval must be positive and finite, got {0}")]
    InvalidInterval(f64),

    /// Sort element selector names only one of its two keys.
    #[error("sort selector needs both subId and subProp")]
    IncompleteSelector,

    /// Description document failed to deserialize.
    #[error("invalid description: {0}")]
    Description(#[from] serde_json::Error),
}

impl SiftError {
    pub(crate) fn operand(op: &'static str, expected: &'static str, actual: &'static str) -> Self {
        Self::InvalidOperand {
            op,
            expected,
            actual,
        }
    }
}

/// Result type for sift operations.
pub type Result<T> = std::result::Result<T, SiftError>;

//! Error types for the grading pipeline.
//!
//! Three families, matching how the dashboard reacts to them:
//! input-format errors (recoverable with a fallback), grading errors (the
//! pass aborts and nothing is published) and event-source errors.

use thiserror::Error;

/// Errors raised while parsing operator-supplied dictionary text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    /// A character that does not fit the literal grammar.
    #[error("unexpected '{found}' at position {position}, expected {expected}")]
    UnexpectedChar {
        found: char,
        position: usize,
        expected: &'static str,
    },

    /// The input stopped in the middle of a literal.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// Non-whitespace content after the closing brace.
    #[error("trailing input at position {position}")]
    TrailingInput { position: usize },

    /// A value other than a boolean or a number.
    #[error("unsupported value for '{key}': only booleans and numbers are allowed")]
    UnsupportedValue { key: String },

    /// A numeric token that does not parse to a finite number.
    #[error("invalid number '{text}'")]
    InvalidNumber { text: String },

    /// The same key appears twice.
    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    /// A weight matrix is missing one of its four outcome keys.
    #[error("weight matrix is missing outcome '{0}'")]
    MissingWeight(&'static str),

    /// A weight matrix key that is not one of the outcome names.
    #[error("unknown weight key '{0}' (expected TT, TF, FT, FF or TP, FP, FN, TN)")]
    UnknownWeightKey(String),

    /// A weight or coefficient given as a boolean.
    #[error("'{key}' must be a number")]
    NotANumber { key: String },

    /// A bareme coefficient below zero.
    #[error("coefficient for '{key}' must be non-negative, got {value}")]
    NegativeCoefficient { key: String, value: f64 },
}

/// Errors that abort a grading pass.
#[derive(Debug, Error)]
pub enum GradingError {
    /// Weights that cannot be used (non-finite values).
    #[error("invalid weight matrix: {0}")]
    InvalidWeights(String),

    /// A coefficient that is negative or not finite.
    #[error("invalid coefficient for question '{question}': {value}")]
    InvalidCoefficient { question: String, value: f64 },

    /// Fixed-title normalization with coefficients summing to zero.
    #[error("sum of coefficients is {sum}, final marks cannot be normalized")]
    DegenerateCoefficients { sum: f64 },

    /// The scorer returned a randomized-exam row without a `Note`.
    #[error("scorer returned no Note for student '{student}' in randomized-exam mode")]
    MissingNote { student: String },

    /// Coefficients were edited before any correction run.
    #[error("no raw scores available, run a correction first")]
    NotScored,

    /// The scorer collaborator failed.
    #[error("scorer failed: {0:#}")]
    Scorer(anyhow::Error),
}

/// Errors that can occur when fetching the event log.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The remote rejected the shared secret.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The log location does not exist.
    #[error("event log not found: {0}")]
    NotFound(String),

    /// The remote answered with an error status.
    #[error("source error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    /// The log was fetched but could not be decoded.
    #[error("malformed event log: {0}")]
    Malformed(String),

    /// A transport-level failure.
    #[error("network error: {0}")]
    Network(String),
}

impl SourceError {
    /// Returns `true` if re-pulling on the next refresh cannot succeed
    /// without operator action.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SourceError::AuthenticationFailed(_) | SourceError::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_source_errors() {
        assert!(SourceError::AuthenticationFailed("bad secret".into()).is_permanent());
        assert!(SourceError::NotFound("events.json".into()).is_permanent());
        assert!(!SourceError::Network("reset".into()).is_permanent());
        assert!(!SourceError::Http {
            status: 503,
            message: "busy".into()
        }
        .is_permanent());
    }

    #[test]
    fn degenerate_message_mentions_sum() {
        let err = GradingError::DegenerateCoefficients { sum: 0.0 };
        assert!(err.to_string().contains("sum of coefficients is 0"));
    }
}

use rating_dsl::ParsingError;
use thiserror::Error;

/// The error taxonomy exposed to hosts, grounded on the source's
/// `RatingEngineError` enum and the internal parsing/evaluation error
/// categories described in the design.
#[derive(Debug, Error, Clone)]
pub enum RatingError {
    /// A formula referenced an identifier the context cannot resolve.
    #[error("input parameter missing: '{0}' not defined")]
    InputParameterMissing(String),

    /// `/` or `mod` produced an undefined result because of a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// The DSL `error(code)` built-in was invoked; `code` is the numeric
    /// payload the caller supplied, exposed unchanged.
    #[error("calculation cancelled with code {0}")]
    CalculationCancelled(f64),

    /// Reserved for host-function failures that should be tagged as
    /// caused by the caller rather than the engine.
    #[error("caller-specific error: {0}")]
    CallerSpecific(String),

    /// Syntax error, or a malformed number/date/string encountered during
    /// tokenizing or parsing (including built-ins whose arguments must be
    /// well-formed dates or in-range indices, e.g. `day('2015-02-29')` or
    /// `substr('abc', 0, 1)`).
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    /// A type mismatch in an operator or a bad argument to a built-in
    /// that is not itself a parsing-shaped error.
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl RatingError {
    /// A short machine-readable category, mirroring the taxonomy in
    /// the design document.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InputParameterMissing(_) => "INPUT_PARAMETER_MISSING",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::CalculationCancelled(_) => "CALCULATION_CANCELLED",
            Self::CallerSpecific(_) => "CALLER_SPECIFIC",
            Self::Parsing(_) => "PARSING_ERROR",
            Self::Evaluation(_) => "EVALUATION_ERROR",
        }
    }

    /// `true` if retrying the same `calculate` call with different caches
    /// (but the same inputs/formulas) could plausibly succeed. None of
    /// these error kinds are retry-recoverable without changing the
    /// inputs or formulas, but the distinction is kept for symmetry with
    /// the rest of the taxonomy and for hosts that want to branch on it.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }
}

pub(crate) fn evaluation(message: impl Into<String>) -> RatingError {
    RatingError::Evaluation(message.into())
}

//! Quota denial types.

/// Why admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum DenyReason {
    /// Tenant never picked a plan
    #[display("plan none")]
    PlanNone,
    /// Trial days are used up
    #[display("trial exhausted")]
    TrialExhausted,
    /// Paid subscription lapsed
    #[display("plan old")]
    PlanLapsed,
    /// Usage reached the period ceiling
    #[display("token limit reached ({}/{})", usage, limit)]
    LimitReached {
        /// Tokens consumed this period
        usage: u64,
        /// Ceiling for this period
        limit: u64,
    },
}

/// Admission denial with location tracking.
///
/// # Examples
///
/// ```
/// use tollgate_error::{DenyReason, QuotaError};
///
/// let err = QuotaError::new(DenyReason::PlanNone);
/// assert!(format!("{}", err).contains("plan none"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Token limit exceeded: {} at line {} in {}", reason, line, file)]
pub struct QuotaError {
    /// Why the request was denied
    pub reason: DenyReason,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl QuotaError {
    /// Create a new denial with automatic location tracking.
    #[track_caller]
    pub fn new(reason: DenyReason) -> Self {
        let location = std::panic::Location::caller();
        Self {
            reason,
            line: location.line(),
            file: location.file(),
        }
    }
}

//! Billing provider error types.

/// Billing provider failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum BillingErrorKind {
    /// Querying the active subscription failed
    #[display("Subscription query failed: {}", _0)]
    Query(String),
    /// Cancelling a subscription failed
    #[display("Subscription cancel failed: {}", _0)]
    Cancel(String),
    /// The requested tier is not sold
    #[display("Unknown tier: {}", _0)]
    UnknownTier(String),
    /// Provider could not be reached
    #[display("Billing provider unavailable: {}", _0)]
    Unavailable(String),
}

impl BillingErrorKind {
    /// Check if this error type should be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingErrorKind::Unavailable(_))
    }
}

/// Billing provider error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Billing Error: {} at line {} in {}", kind, line, file)]
pub struct BillingError {
    /// The kind of error that occurred
    pub kind: BillingErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl BillingError {
    /// Create a new billing error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: BillingErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &BillingErrorKind {
        &self.kind
    }
}

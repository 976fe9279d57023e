//! Top-level error wrapper types.

use crate::{
    BillingError, ConfigError, DenyReason, JsonError, MeteredError, PlanError, QuotaError,
    StoreError,
};

/// Every failure the gateway can surface, one variant per kind.
///
/// # Examples
///
/// ```
/// use tollgate_error::{DenyReason, QuotaError, TollgateError, TollgateErrorKind};
///
/// let err: TollgateError = QuotaError::new(DenyReason::TrialExhausted).into();
/// assert!(matches!(err.kind(), TollgateErrorKind::TokenLimitExceeded(_)));
/// assert_eq!(err.deny_reason(), Some(DenyReason::TrialExhausted));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum TollgateErrorKind {
    /// Admission denied for a quota or plan reason
    #[from(QuotaError)]
    TokenLimitExceeded(QuotaError),
    /// Persistent store unreachable, lookup or update failed
    #[from(StoreError)]
    AccountLookupFailed(StoreError),
    /// Subscription create, cancel or query failed
    #[from(BillingError)]
    BillingProvider(BillingError),
    /// External metered operation failed after admission
    #[from(MeteredError)]
    MeteredOperationFailed(MeteredError),
    /// Explicit plan action refused
    #[from(PlanError)]
    PlanTransitionRejected(PlanError),
    /// Configuration could not be loaded or validated
    #[from(ConfigError)]
    Config(ConfigError),
    /// Output could not be encoded
    #[from(JsonError)]
    Json(JsonError),
}

/// Tollgate error with kind discrimination.
///
/// # Examples
///
/// ```
/// use tollgate_error::{ConfigError, TollgateResult};
///
/// fn might_fail() -> TollgateResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Tollgate Error: {}", _0)]
pub struct TollgateError(Box<TollgateErrorKind>);

impl TollgateError {
    /// Create a new error from a kind.
    pub fn new(kind: TollgateErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &TollgateErrorKind {
        &self.0
    }

    /// Denial reason when this is a quota decision, `None` for every fault.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self.kind() {
            TollgateErrorKind::TokenLimitExceeded(e) => Some(e.reason),
            _ => None,
        }
    }

    /// Whether the caller may retry the same request.
    ///
    /// Quota denials and plan rejections are final. Store and billing
    /// outages and version conflicts are transient.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            TollgateErrorKind::AccountLookupFailed(e) => e.kind.is_retryable(),
            TollgateErrorKind::BillingProvider(e) => e.kind.is_retryable(),
            _ => false,
        }
    }

    /// True when a conditional store write lost a race.
    pub fn is_conflict(&self) -> bool {
        matches!(self.kind(), TollgateErrorKind::AccountLookupFailed(e) if e.is_conflict())
    }
}

// Generic From implementation for any type that converts to TollgateErrorKind
impl<T> From<T> for TollgateError
where
    T: Into<TollgateErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Tollgate operations.
pub type TollgateResult<T> = std::result::Result<T, TollgateError>;

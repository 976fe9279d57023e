//! Admission decisions.

use tollgate_error::{DenyReason, QuotaError};

/// Outcome of the admission check for a metered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The operation may run
    Allow,
    /// The operation is refused
    Deny(DenyReason),
}

impl Admission {
    /// True for [`Admission::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }

    /// Convert into a result, turning a denial into a [`QuotaError`].
    ///
    /// # Examples
    ///
    /// ```
    /// use tollgate_core::Admission;
    /// use tollgate_error::DenyReason;
    ///
    /// assert!(Admission::Allow.into_result().is_ok());
    /// let err = Admission::Deny(DenyReason::PlanLapsed).into_result().unwrap_err();
    /// assert_eq!(err.reason, DenyReason::PlanLapsed);
    /// ```
    #[track_caller]
    pub fn into_result(self) -> Result<(), QuotaError> {
        match self {
            Admission::Allow => Ok(()),
            Admission::Deny(reason) => Err(QuotaError::new(reason)),
        }
    }
}

//! Metered operation error types.

/// Failure of the external metered operation after admission was granted.
///
/// Carries no usage: a failed operation is never charged.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Metered Operation Error: {} at line {} in {}", message, line, file)]
pub struct MeteredError {
    /// The underlying error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl MeteredError {
    /// Create a new MeteredError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use tollgate_error::MeteredError;
    ///
    /// let err = MeteredError::new("completion endpoint timed out");
    /// assert!(err.message.contains("timed out"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

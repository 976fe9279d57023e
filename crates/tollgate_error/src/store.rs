//! Account store error types.

/// Kinds of account store errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StoreErrorKind {
    /// No account exists for the tenant
    #[display("Account not found: {}", _0)]
    NotFound(String),
    /// Insert-if-absent found an existing record
    #[display("Account already exists: {}", _0)]
    AlreadyExists(String),
    /// Conditional update ran against a stale snapshot
    #[display(
        "Version conflict for {}: expected version {}, found {}",
        tenant,
        expected,
        found
    )]
    VersionConflict {
        /// Tenant whose record changed underneath the writer
        tenant: String,
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        found: u64,
    },
    /// Backend unreachable or refused the request
    #[display("Store unavailable: {}", _0)]
    Unavailable(String),
    /// Record could not be encoded or decoded
    #[display("Serialization failed: {}", _0)]
    Serialization(String),
    /// Filesystem failure
    #[display("I/O failure: {}", _0)]
    Io(String),
}

impl StoreErrorKind {
    /// Check if the operation may succeed when attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreErrorKind::VersionConflict { .. }
                | StoreErrorKind::Unavailable(_)
                | StoreErrorKind::Io(_)
        )
    }
}

/// Account store error with location tracking.
///
/// # Examples
///
/// ```
/// use tollgate_error::{StoreError, StoreErrorKind};
///
/// let err = StoreError::new(StoreErrorKind::NotFound("shop-1".to_string()));
/// assert!(format!("{}", err).contains("not found"));
/// assert!(!err.is_conflict());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Store Error: {} at line {} in {}", kind, line, file)]
pub struct StoreError {
    /// The kind of error that occurred
    pub kind: StoreErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StoreError {
    /// Create a new store error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StoreErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StoreErrorKind {
        &self.kind
    }

    /// True when a conditional write lost a race.
    pub fn is_conflict(&self) -> bool {
        matches!(self.kind, StoreErrorKind::VersionConflict { .. })
    }
}

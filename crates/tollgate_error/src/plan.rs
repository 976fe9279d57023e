//! Plan transition error types.

/// Explicit user actions the subscription state machine refuses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PlanErrorKind {
    /// Transition not allowed from the current plan
    #[display("Cannot move from plan {} to {}", from, to)]
    InvalidTransition {
        /// Current plan
        from: String,
        /// Requested plan
        to: String,
    },
    /// The tenant has no trial days left
    #[display("Trial already used up for {}", _0)]
    TrialUnavailable(String),
}

/// Plan transition error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Plan Error: {} at line {} in {}", kind, line, file)]
pub struct PlanError {
    /// The specific error kind
    pub kind: PlanErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl PlanError {
    /// Create a new plan error with location tracking.
    #[track_caller]
    pub fn new(kind: PlanErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &PlanErrorKind {
        &self.kind
    }
}

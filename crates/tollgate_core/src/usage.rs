//! Usage reported by metered operations and the journal records built from it.

use crate::TenantId;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tokens consumed by one metered operation.
///
/// # Examples
///
/// ```
/// use tollgate_core::UsageReport;
///
/// let first = UsageReport::new(120, 30);
/// let follow_up = UsageReport::new(200, 50);
/// let combined = first.combine(&follow_up);
/// assert_eq!(combined.total_tokens, 400);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageReport {
    /// Tokens sent to the model
    pub prompt_tokens: u64,
    /// Tokens produced by the model
    pub completion_tokens: u64,
    /// Billable total
    pub total_tokens: u64,
}

impl UsageReport {
    /// Report with total equal to prompt plus completion.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Report that only knows the billable total.
    pub fn total(total_tokens: u64) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens,
        }
    }

    /// Sum of two reports, for operations that make several model calls.
    pub fn combine(&self, other: &UsageReport) -> UsageReport {
        UsageReport {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

/// Successful result of a metered operation together with its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Metered<T> {
    /// Whatever the operation produced
    pub value: T,
    /// What it cost
    pub usage: UsageReport,
}

impl<T> Metered<T> {
    /// Pair a value with its usage.
    pub fn new(value: T, usage: UsageReport) -> Self {
        Self { value, usage }
    }
}

/// Final state of a metered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationStatus {
    /// Completed and charged
    Succeeded,
    /// Failed after admission, not charged
    Failed,
}

/// Journal entry for one metered operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct OperationRecord {
    id: Uuid,
    tenant_id: TenantId,
    timestamp: DateTime<Utc>,
    status: OperationStatus,
    usage: Option<UsageReport>,
    error: Option<String>,
}

impl OperationRecord {
    /// Record a charged operation.
    pub fn succeeded(tenant_id: TenantId, timestamp: DateTime<Utc>, usage: UsageReport) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            timestamp,
            status: OperationStatus::Succeeded,
            usage: Some(usage),
            error: None,
        }
    }

    /// Record an operation that failed after admission.
    pub fn failed(
        tenant_id: TenantId,
        timestamp: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            timestamp,
            status: OperationStatus::Failed,
            usage: None,
            error: Some(error.into()),
        }
    }
}

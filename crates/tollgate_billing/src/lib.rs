//! Billing provider backends for Tollgate.
//!
//! [`LocalBillingProvider`] keeps subscriptions in process memory, optionally
//! mirrored to a JSON file. It stands in for the commerce platform during
//! development, in tests and behind the `tollgate` CLI.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod local;

pub use local::{LocalBillingProvider, LocalSubscription, SubscriptionStatus};

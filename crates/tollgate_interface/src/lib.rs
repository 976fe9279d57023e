//! Collaborator traits for the Tollgate quota gateway.
//!
//! The gateway never talks to a database, a billing platform or a model
//! endpoint directly. It goes through the traits defined here:
//!
//! - [`AccountStore`] - keyed account records with conditional update
//! - [`BillingProvider`] - active subscription lookup, create and cancel
//! - [`OperationJournal`] - audit sink for metered operation outcomes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::{AccountStore, BillingProvider, OperationJournal, SubscriptionHandle};

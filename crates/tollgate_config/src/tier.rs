//! Tier trait for representing plan quota constraints.

/// Quota and pricing of a plan tier.
///
/// # Example
///
/// ```
/// use tollgate_config::Tier;
///
/// struct Starter;
///
/// impl Tier for Starter {
///     fn token_limit(&self) -> u64 { 10_000 }
///     fn price_usd(&self) -> Option<f64> { Some(4.99) }
///     fn interval_days(&self) -> Option<u32> { Some(30) }
///     fn name(&self) -> &str { "starter" }
/// }
///
/// assert!(!Starter.is_free());
/// ```
pub trait Tier: Send + Sync {
    /// Daily token ceiling.
    fn token_limit(&self) -> u64;

    /// Recurring price in USD.
    ///
    /// Returns `None` for free tiers.
    fn price_usd(&self) -> Option<f64>;

    /// Billing interval in days.
    ///
    /// Returns `None` when the tier is not billed.
    fn interval_days(&self) -> Option<u32>;

    /// Name of the tier as the billing provider knows it (e.g., "basic").
    fn name(&self) -> &str;

    /// Whether the tier is free of charge.
    fn is_free(&self) -> bool {
        self.price_usd().is_none_or(|price| price <= 0.0)
    }
}

//! Business policy knobs
//!
//! One flat struct carrying every configurable rule the engine enforces.
//! Defaults mirror the production configuration; the CLI exposes the
//! subset worth overriding for replay runs.

use crate::types::Amount;
use chrono::Duration;

/// Tunable business rules, shared read-only by every component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Reward credited to the referrer per qualifying conversion, minor units
    pub referral_reward: Amount,

    /// Minimum first-order subtotal for a conversion to pay out
    pub min_order_subtotal: Amount,

    /// Max reward-paying conversions per IP address per trailing 24 hours
    pub ip_daily_cap: u32,

    /// Hours after conversion during which a refund revokes the reward
    pub revoke_window_hours: i64,

    /// Subtotal at or above which shipping is free, minor units
    pub free_shipping_threshold: Amount,

    /// Base shipping cost, minor units
    pub shipping_cost: Amount,

    /// Percentage off granted by the first-order promo issued alongside
    /// each referral code
    pub first_order_discount_percent: i64,

    /// Days the first-order promo stays redeemable
    pub first_order_promo_days: i64,

    /// Length of generated referral codes
    pub referral_code_len: usize,

    /// Length of generated gift card codes
    pub gift_code_len: usize,
}

impl Policy {
    /// The refund window as a duration
    pub fn revoke_window(&self) -> Duration {
        Duration::hours(self.revoke_window_hours)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            referral_reward: 500,          // EUR 5.00
            min_order_subtotal: 2_000,     // EUR 20.00
            ip_daily_cap: 3,
            revoke_window_hours: 14 * 24,  // matches the 14-day refund window
            free_shipping_threshold: 5_000,
            shipping_cost: 590,
            first_order_discount_percent: 10,
            first_order_promo_days: 90,
            referral_code_len: 8,
            gift_code_len: 12,
        }
    }
}

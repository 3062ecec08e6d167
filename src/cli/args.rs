use crate::config::Policy;
use crate::types::Amount;
use clap::Parser;
use std::path::PathBuf;

/// Replay store-credit and discount operations from a CSV file
#[derive(Parser, Debug)]
#[command(name = "store-credit-engine")]
#[command(about = "Replay store-credit and discount operations from CSV", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing replay operations
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Referral reward per qualifying conversion, in minor units
    #[arg(long = "referral-reward", value_name = "AMOUNT")]
    pub referral_reward: Option<Amount>,

    /// Minimum first-order subtotal for a conversion to pay out
    #[arg(long = "min-order", value_name = "AMOUNT")]
    pub min_order_subtotal: Option<Amount>,

    /// Max reward-paying conversions per IP per trailing 24 hours
    #[arg(long = "ip-daily-cap", value_name = "COUNT")]
    pub ip_daily_cap: Option<u32>,

    /// Hours after conversion during which a refund revokes the reward
    #[arg(long = "revoke-window-hours", value_name = "HOURS")]
    pub revoke_window_hours: Option<i64>,
}

impl CliArgs {
    /// Build the engine policy from CLI overrides over the defaults
    pub fn to_policy(&self) -> Policy {
        let mut policy = Policy::default();
        if let Some(reward) = self.referral_reward {
            policy.referral_reward = reward;
        }
        if let Some(minimum) = self.min_order_subtotal {
            policy.min_order_subtotal = minimum;
        }
        if let Some(cap) = self.ip_daily_cap {
            policy.ip_daily_cap = cap;
        }
        if let Some(hours) = self.revoke_window_hours {
            policy.revoke_window_hours = hours;
        }
        policy
    }
}

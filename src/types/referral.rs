//! Referral program types
//!
//! A user owns at most one permanent [`ReferralCode`]; presenting someone
//! else's code at registration creates a [`ReferralRelationship`] that
//! moves through `Pending -> Converted -> Revoked` and never back.

use crate::types::money::Amount;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Referral relationship identifier
pub type RelationshipId = u64;

/// Lifecycle of a referral relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    /// Created at registration; waiting for the referee's first qualifying
    /// order
    Pending,

    /// The referee's one conversion attempt has been consumed
    ///
    /// Terminal unless the reward is revoked inside the refund window.
    /// `reward_credited` records whether the attempt actually paid out.
    Converted,

    /// Reward reversed after a refund; terminal
    Revoked,
}

/// A user's permanent referral code and lifetime counters
///
/// Issued once at registration; the code string is never reassigned, even
/// if the account is later suspended (`is_active = false`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralCode {
    /// Code owner (the referrer)
    pub owner: UserId,

    /// 8-character code from the reduced alphabet (unique, permanent)
    pub code: String,

    /// False after account suspension; blocks new relationships only
    pub is_active: bool,

    /// Relationships ever created from this code
    pub total_referrals: u32,

    /// Conversions that actually credited a reward
    ///
    /// Floored at zero when revocations decrement it.
    pub total_conversions: u32,

    /// Lifetime reward credit in minor units, floored at zero on revocation
    pub total_earned: Amount,

    /// When the code was issued
    pub created_at: DateTime<Utc>,
}

/// The referrer/referee link created when a code is presented at
/// registration
///
/// A referee has at most one relationship, ever; re-registering with a
/// different code is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralRelationship {
    /// Identifier, used as the ledger reference for reward and revocation
    pub id: RelationshipId,

    /// Owner of the presented code
    pub referrer: UserId,

    /// The newly registered user (unique key)
    pub referee: UserId,

    /// The code that was presented
    pub code: String,

    /// Current lifecycle state
    pub status: ReferralStatus,

    /// Reward in minor units the referrer earns on conversion, captured
    /// from policy at creation time
    pub reward_amount: Amount,

    /// Whether the conversion attempt actually credited the reward
    pub reward_credited: bool,

    /// Registration IP, consulted by the per-IP daily conversion cap
    pub ip_address: String,

    /// Order that converted the relationship
    pub converted_order: Option<u64>,

    /// When the conversion was recorded
    pub converted_at: Option<DateTime<Utc>>,

    /// When the reward was revoked
    pub revoked_at: Option<DateTime<Utc>>,

    /// Support-facing reason captured at revocation
    pub revoke_reason: Option<String>,

    /// When the relationship was created
    pub created_at: DateTime<Utc>,
}

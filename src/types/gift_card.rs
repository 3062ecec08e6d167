//! Gift card types

use crate::types::money::Amount;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Gift card identifier
pub type GiftCardId = u64;

/// Who a gift card was issued for
///
/// Free-form contact details; delivery itself belongs to the surrounding
/// notification layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientInfo {
    /// Display name printed on the card
    pub name: Option<String>,

    /// Delivery address for the card email
    pub email: Option<String>,
}

/// A stored-value card redeemable exactly once
///
/// Cards are never deleted: a deactivated or redeemed card stays in the
/// vault for audit, and its code stays in the code registry forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftCard {
    /// Vault-assigned identifier
    pub id: GiftCardId,

    /// Human-shareable code from the reduced alphabet (unique)
    pub code: String,

    /// Unguessable token encoded in the card's QR image (unique)
    ///
    /// Redemption is keyed by this token, not by the printable code.
    pub qr_token: String,

    /// Face value in minor units
    pub amount: Amount,

    /// Value still on the card: `amount` until redemption, then 0
    ///
    /// Invariant: `0 <= remaining_balance <= amount`.
    pub remaining_balance: Amount,

    /// Terminal flag: once true, no further balance changes
    pub is_redeemed: bool,

    /// Cleared by an admin to block redemption without deleting the card
    pub is_active: bool,

    /// Who redeemed the card, once redeemed
    pub redeemed_by: Option<UserId>,

    /// When the card was redeemed
    pub redeemed_at: Option<DateTime<Utc>>,

    /// Last instant the card can be redeemed, if it expires at all
    pub expires_at: Option<DateTime<Utc>>,

    /// Intended recipient
    pub recipient: RecipientInfo,

    /// Purchase time
    pub issued_at: DateTime<Utc>,
}

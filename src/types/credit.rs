//! Store-credit balance and ledger transaction types
//!
//! A user's store credit is a single balance row plus an append-only log of
//! [`CreditTransaction`] rows. The log is the audit trail: replaying a
//! user's rows in order must reproduce the balance exactly.

use crate::types::money::Amount;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger transaction identifier
pub type TransactionId = u64;

/// Why a ledger row was written
///
/// Together with `reference_id`, the kind forms the idempotency key for
/// every ledger mutation: a retried webhook re-presenting the same
/// `(kind, reference_id)` pair is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionKind {
    /// Credit from a one-time gift card redemption (reference: gift card id)
    GiftCardRedeem,

    /// Credit to a referrer after a qualifying conversion
    /// (reference: relationship id)
    ReferralReward,

    /// Reversal of a referral reward inside the refund window
    /// (reference: relationship id)
    ///
    /// The one kind whose row may drive the balance negative.
    ReferralRevoked,

    /// Debit applied when a confirmed payment spends credit
    /// (reference: order id)
    PurchaseDebit,

    /// Credit returned to the buyer on a refund (reference: order id)
    RefundCredit,

    /// Manual correction via support tooling (reference: ticket id)
    AdminAdjustment,
}

/// Per-user credit balance row
///
/// Created lazily on first credit and never deleted; when the owning user
/// is removed the row is orphaned, not dropped, so the transaction log
/// stays replayable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCredit {
    /// Account owner
    pub user: UserId,

    /// Spendable credit in minor units
    ///
    /// Maintained as `total_earned - total_spent`. Non-negative except
    /// after a referral revocation of already-spent credit.
    pub balance: Amount,

    /// Lifetime credits in minor units
    pub total_earned: Amount,

    /// Lifetime debits in minor units (revocations included)
    pub total_spent: Amount,
}

impl StoreCredit {
    /// Create an empty credit row for `user`
    pub fn new(user: UserId) -> Self {
        StoreCredit {
            user,
            balance: 0,
            total_earned: 0,
            total_spent: 0,
        }
    }
}

/// One immutable row of the append-only credit ledger
///
/// Written exactly once per mutation, under the same lock that updated the
/// balance, so `balance_before`/`balance_after` are exact. Never updated
/// or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Monotonic transaction id (global across users)
    pub id: TransactionId,

    /// Account owner
    pub user: UserId,

    /// Signed amount in minor units: positive credit, negative debit
    pub amount: Amount,

    /// Why the row was written
    pub kind: TransactionKind,

    /// Id of the record that caused the mutation; pairs with `kind` as the
    /// idempotency key
    pub reference_id: u64,

    /// Balance immediately before this row applied
    pub balance_before: Amount,

    /// Balance immediately after this row applied
    pub balance_after: Amount,

    /// When the mutation committed
    pub timestamp: DateTime<Utc>,
}

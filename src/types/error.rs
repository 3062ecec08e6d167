//! Error types for the store-credit engine
//!
//! Every expected business condition (code already used, balance too low,
//! rate limit hit) is a variant of [`CreditError`] and is returned, never
//! panicked. Variants carry the context needed for server-side logging;
//! user-facing layers are expected to map them to generic messages.

use crate::types::money::Amount;
use crate::types::UserId;
use thiserror::Error;

/// Main error type for ledger, vault, referral and registry operations
///
/// Each variant includes the identifiers needed to diagnose the rejection
/// in logs. None of the messages are meant to be shown to end users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreditError {
    /// Malformed input: bad amount, bad code shape, inconsistent dates
    ///
    /// Recoverable; the operation is rejected with no state change.
    #[error("Validation failed for {field}: {message}")]
    Validation {
        /// The offending field
        field: &'static str,
        /// Description of the problem
        message: String,
    },

    /// A referenced entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind ("gift card", "promotion", ...)
        entity: &'static str,
        /// The lookup key that failed
        key: String,
    },

    /// One-shot resource consumed: redeemed gift card, converted referral,
    /// or a code already present in the registry
    #[error("{entity} already used: {key}")]
    AlreadyUsed {
        /// Entity kind
        entity: &'static str,
        /// The key of the consumed resource
        key: String,
    },

    /// Entity exists but has been deactivated by an admin or suspension
    #[error("{entity} is inactive: {key}")]
    Inactive {
        /// Entity kind
        entity: &'static str,
        /// The key of the inactive resource
        key: String,
    },

    /// Debit would drive the balance below zero
    ///
    /// Recoverable; no partial debit is ever applied.
    #[error("Insufficient balance for user {user}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// Account owner
        user: UserId,
        /// Current balance in minor units
        balance: Amount,
        /// Requested debit in minor units
        requested: Amount,
    },

    /// Per-IP conversion cap reached within the trailing window
    #[error("Rate limit exceeded for {ip}: {count} conversions in the last 24h (cap {cap})")]
    RateLimited {
        /// The originating IP address
        ip: String,
        /// Conversions already counted for the IP
        count: u32,
        /// Configured daily cap
        cap: u32,
    },

    /// Entity past its validity window (gift card `expires_at`)
    #[error("{entity} expired: {key}")]
    Expired {
        /// Entity kind
        entity: &'static str,
        /// Key of the expired resource
        key: String,
    },

    /// Revocation attempted after the refund window closed
    #[error("Revocation window closed for order {order}")]
    OutsideWindow {
        /// Order whose reward can no longer be revoked
        order: u64,
    },

    /// A user presented their own referral code
    #[error("Self-referral rejected for user {user}")]
    SelfReferral {
        /// The user who referred themselves
        user: UserId,
    },

    /// Lock-wait timeout from a backing store; retryable by the caller
    ///
    /// The in-memory build blocks on entry locks instead of timing out, so
    /// this variant is reserved for storage-backed implementations.
    #[error("Concurrency conflict on {resource}, retry with backoff")]
    ConcurrencyConflict {
        /// Description of the contended row
        resource: String,
    },

    /// Code generation exhausted its attempt budget
    ///
    /// Operationally near-impossible over a 31-symbol alphabet, but a
    /// defined failure rather than an unbounded loop.
    #[error("Code space exhausted after {attempts} attempts")]
    CodeSpaceExhausted {
        /// Number of generation attempts made
        attempts: u32,
    },

    /// Checked arithmetic failed while mutating a balance
    ///
    /// Recoverable; the mutation is rejected to keep the account intact.
    #[error("Arithmetic overflow in {operation} for user {user}")]
    Overflow {
        /// Operation that would overflow
        operation: &'static str,
        /// Account owner
        user: UserId,
    },
}

impl CreditError {
    /// Create a Validation error
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CreditError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        CreditError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Create an AlreadyUsed error
    pub fn already_used(entity: &'static str, key: impl Into<String>) -> Self {
        CreditError::AlreadyUsed {
            entity,
            key: key.into(),
        }
    }

    /// Create an Inactive error
    pub fn inactive(entity: &'static str, key: impl Into<String>) -> Self {
        CreditError::Inactive {
            entity,
            key: key.into(),
        }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(user: UserId, balance: Amount, requested: Amount) -> Self {
        CreditError::InsufficientBalance {
            user,
            balance,
            requested,
        }
    }

    /// Create an Expired error
    pub fn expired(entity: &'static str, key: impl Into<String>) -> Self {
        CreditError::Expired {
            entity,
            key: key.into(),
        }
    }

    /// Create an Overflow error
    pub fn overflow(operation: &'static str, user: UserId) -> Self {
        CreditError::Overflow { operation, user }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::validation(
        CreditError::validation("amount", "must be positive"),
        "Validation failed for amount: must be positive"
    )]
    #[case::not_found(
        CreditError::not_found("gift card", "QRTOKEN123"),
        "gift card not found: QRTOKEN123"
    )]
    #[case::already_used(
        CreditError::already_used("gift card", "QRTOKEN123"),
        "gift card already used: QRTOKEN123"
    )]
    #[case::inactive(
        CreditError::inactive("referral code", "ABCD2345"),
        "referral code is inactive: ABCD2345"
    )]
    #[case::insufficient_balance(
        CreditError::insufficient_balance(7, 500, 1_000),
        "Insufficient balance for user 7: balance 500, requested 1000"
    )]
    #[case::rate_limited(
        CreditError::RateLimited { ip: "10.0.0.1".to_string(), count: 3, cap: 3 },
        "Rate limit exceeded for 10.0.0.1: 3 conversions in the last 24h (cap 3)"
    )]
    #[case::expired(
        CreditError::expired("gift card", "QRTOKEN123"),
        "gift card expired: QRTOKEN123"
    )]
    #[case::outside_window(
        CreditError::OutsideWindow { order: 42 },
        "Revocation window closed for order 42"
    )]
    #[case::self_referral(
        CreditError::SelfReferral { user: 9 },
        "Self-referral rejected for user 9"
    )]
    #[case::code_space_exhausted(
        CreditError::CodeSpaceExhausted { attempts: 100 },
        "Code space exhausted after 100 attempts"
    )]
    #[case::overflow(
        CreditError::overflow("credit", 3),
        "Arithmetic overflow in credit for user 3"
    )]
    fn test_error_display(#[case] error: CreditError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }
}

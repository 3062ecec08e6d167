//! Types module
//!
//! Core data structures used throughout the engine, organized into logical
//! submodules:
//! - `money`: minor-unit amounts and rounding
//! - `credit`: store-credit balances and the ledger transaction log
//! - `gift_card`: stored-value cards
//! - `referral`: referral codes and relationships
//! - `promotion`: discount rules
//! - `pricing`: composer inputs/outputs and payment confirmations
//! - `error`: the engine-wide error taxonomy

pub mod credit;
pub mod error;
pub mod gift_card;
pub mod money;
pub mod pricing;
pub mod promotion;
pub mod referral;

/// User identifier
///
/// Identity is owned by an external auth provider; this engine only ever
/// receives already-authenticated ids.
pub type UserId = u64;

/// Order identifier, assigned by the surrounding checkout service
pub type OrderId = u64;

pub use credit::{CreditTransaction, StoreCredit, TransactionId, TransactionKind};
pub use error::CreditError;
pub use gift_card::{GiftCard, GiftCardId, RecipientInfo};
pub use money::Amount;
pub use pricing::{PaymentConfirmation, PricingRequest, Quote};
pub use promotion::{DiscountType, PromotionCode, PromotionId, PromotionScope};
pub use referral::{ReferralCode, ReferralRelationship, ReferralStatus, RelationshipId};

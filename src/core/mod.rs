//! Engine core: code registry, ledger, gift cards, promotions,
//! referrals and the pricing/confirmation logic that ties them together

pub mod code_registry;
pub mod engine;
pub mod gift_vault;
pub mod ledger;
pub mod pricing;
pub mod promotions;
pub mod referrals;

pub use code_registry::CodeRegistry;
pub use engine::CheckoutEngine;
pub use gift_vault::GiftCardVault;
pub use ledger::LedgerStore;
pub use promotions::PromotionCatalog;
pub use referrals::{ConversionOutcome, ReferralStateMachine, RevokeOutcome};

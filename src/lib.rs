//! Store Credit Engine Library
//! # Overview
//!
//! This library implements a store-credit ledger and discount composition
//! engine: gift cards, referral rewards, promotion codes and store credit,
//! combined into a single checkout charge.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (GiftCard, PromotionCode, CreditTransaction, etc.)
//! - [`config`] - Business policy knobs shared by every component
//! - [`cli`] - CLI argument parsing
//! - [`core`] - Business logic components:
//!   - [`core::code_registry`] - Permanent record of every code ever issued
//!   - [`core::ledger`] - Append-only store-credit ledger with replayable history
//!   - [`core::gift_vault`] - Gift card issuance and one-time redemption
//!   - [`core::promotions`] - Promotion catalog with validity and usage budgets
//!   - [`core::referrals`] - Referral lifecycle, rewards and anti-abuse policy
//!   - [`core::pricing`] - Pure composition of discounts into a final charge
//!   - [`core::engine`] - Wiring plus the payment-confirmation handler
//! - [`io`] - CSV parsing and balance output
//! - [`replay`] - Offline driver feeding recorded operations to the engine
//!
//! # Code Lifecycle
//!
//! Every printable code (gift card, referral, promotion) is burned in the
//! [`core::code_registry`] the moment it is issued and is never reused,
//! even after its owning record is deactivated.
//!
//! # Money
//!
//! All amounts are integer minor units (cents). Percentage discounts
//! round half away from zero at each multiplicative step.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod replay;
pub mod types;

pub use config::Policy;
pub use core::{CheckoutEngine, CodeRegistry, GiftCardVault, LedgerStore, PromotionCatalog, ReferralStateMachine};
pub use io::write_balances_csv;
pub use types::{
    Amount, CreditError, CreditTransaction, GiftCard, OrderId, PromotionCode, Quote,
    ReferralCode, StoreCredit, TransactionKind, UserId,
};

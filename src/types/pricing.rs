//! Pricing composition inputs and outputs

use crate::types::gift_card::GiftCard;
use crate::types::money::Amount;
use crate::types::promotion::PromotionCode;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the composer reads to price a checkout
///
/// Snapshots only: the composer never writes, so the promo and gift card
/// are borrowed copies taken by the caller. An invalid promo or an empty
/// gift card is not an error; it contributes zero.
#[derive(Debug, Clone)]
pub struct PricingRequest<'a> {
    /// Cart subtotal in minor units
    pub subtotal: Amount,

    /// Promotion presented at checkout, if any
    pub promo: Option<&'a PromotionCode>,

    /// Gift card presented at checkout, if any
    pub gift_card: Option<&'a GiftCard>,

    /// Store credit the shopper asked to spend
    pub requested_credit: Amount,

    /// The shopper's current ledger balance
    pub credit_balance: Amount,

    /// Base shipping cost before threshold and credit
    pub shipping_cost: Amount,

    /// Subtotal at or above which shipping is free
    pub free_shipping_threshold: Amount,

    /// Evaluation instant for promo validity windows
    pub now: DateTime<Utc>,
}

/// The composed charge and its decomposition
///
/// `coupon_total` is what the external payment processor receives as a
/// single aggregate discount instruction. The decomposed fields travel in
/// the payment metadata so the confirmation handler knows exactly how much
/// to take from each source once funds are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// What the processor actually charges, goods plus shipping
    pub final_charge: Amount,

    /// Aggregate discount against the subtotal
    /// (`discount + gift_amount + credit_for_goods`)
    pub coupon_total: Amount,

    /// Shipping after the free threshold and any credit applied to it
    pub shipping: Amount,

    /// Promotion discount
    pub discount: Amount,

    /// Gift card value applied to goods
    pub gift_amount: Amount,

    /// Store credit applied to goods
    pub credit_for_goods: Amount,

    /// Store credit applied to shipping
    pub credit_for_ship: Amount,
}

/// Payment processor confirmation, delivered at least once
///
/// Carries the decomposition computed at session creation; the engine
/// re-applies it verbatim rather than re-pricing, and deduplicates on
/// `payment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Processor-assigned id; idempotency key for the whole confirmation
    pub payment_id: String,

    /// The buyer
    pub user: UserId,

    /// The order being paid for
    pub order_id: u64,

    /// Cart subtotal, needed by referral conversion's minimum-order check
    pub subtotal: Amount,

    /// Promotion code applied at session creation
    pub promo_code: Option<String>,

    /// QR token of the gift card applied at session creation
    pub gift_qr_token: Option<String>,

    /// The decomposition computed by the pricing composer
    pub quote: Quote,
}

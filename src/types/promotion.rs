//! Promotion code types

use crate::types::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Promotion identifier
pub type PromotionId = u64;

/// How a promotion discounts the cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `value` is whole percentage points off the subtotal
    Percentage,

    /// `value` is a fixed amount in minor units, capped at the subtotal
    Fixed,
}

/// What part of the catalog a promotion applies to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromotionScope {
    /// Whole cart
    #[default]
    All,

    /// Carts containing at least one product from these categories
    Categories(Vec<String>),

    /// Carts containing at least one of these product ids
    Products(Vec<u64>),
}

/// An admin-managed discount rule
///
/// Read-mostly; the only non-admin mutation is the atomic usage-count
/// increment recorded after a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionCode {
    /// Catalog-assigned identifier
    pub id: PromotionId,

    /// The code shoppers type at checkout (unique)
    pub code: String,

    /// Percentage or fixed
    pub discount_type: DiscountType,

    /// Percentage points or minor units, per `discount_type`
    pub discount_value: i64,

    /// Minimum cart subtotal for the promo to apply, in minor units
    pub min_purchase: Amount,

    /// Cap on a percentage discount, in minor units
    pub max_discount: Option<Amount>,

    /// Total redemptions allowed, if capped
    pub usage_limit: Option<u32>,

    /// Successful redemptions so far
    pub usage_count: u32,

    /// Start of the validity window
    pub starts_at: DateTime<Utc>,

    /// End of the validity window
    pub ends_at: DateTime<Utc>,

    /// Admin kill switch
    pub is_active: bool,

    /// Catalog scope
    pub scope: PromotionScope,
}

//! Benchmark suite for the pricing composer
//!
//! Uses the divan benchmarking framework to measure quote composition,
//! the one hot path that runs on every checkout page load.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```

use chrono::{Duration, Utc};
use store_credit_engine::core::pricing::compose;
use store_credit_engine::types::{
    DiscountType, GiftCard, PricingRequest, PromotionCode, PromotionScope, RecipientInfo,
};

fn main() {
    divan::main();
}

fn promo() -> PromotionCode {
    let now = Utc::now();
    PromotionCode {
        id: 1,
        code: "WELCOME10".to_string(),
        discount_type: DiscountType::Percentage,
        discount_value: 10,
        min_purchase: 2_000,
        max_discount: Some(5_000),
        usage_limit: None,
        usage_count: 0,
        starts_at: now - Duration::days(1),
        ends_at: now + Duration::days(1),
        is_active: true,
        scope: PromotionScope::All,
    }
}

fn gift_card() -> GiftCard {
    GiftCard {
        id: 1,
        code: "GIFTCODE0001".to_string(),
        qr_token: "token".to_string(),
        amount: 3_000,
        remaining_balance: 3_000,
        is_redeemed: false,
        is_active: true,
        redeemed_by: None,
        redeemed_at: None,
        expires_at: None,
        recipient: RecipientInfo::default(),
        issued_at: Utc::now(),
    }
}

/// Bare cart, nothing to compose
#[divan::bench]
fn compose_bare() {
    let request = PricingRequest {
        subtotal: 10_000,
        promo: None,
        gift_card: None,
        requested_credit: 0,
        credit_balance: 0,
        shipping_cost: 590,
        free_shipping_threshold: 5_000,
        now: Utc::now(),
    };
    divan::black_box(compose(&request));
}

/// Promotion, gift card and store credit stacked together
#[divan::bench]
fn compose_full_stack() {
    let promo = promo();
    let card = gift_card();
    let request = PricingRequest {
        subtotal: 10_000,
        promo: Some(&promo),
        gift_card: Some(&card),
        requested_credit: 5_000,
        credit_balance: 5_000,
        shipping_cost: 590,
        free_shipping_threshold: 5_000,
        now: Utc::now(),
    };
    divan::black_box(compose(&request));
}

/// Percentage rounding path across a sweep of subtotals
#[divan::bench]
fn compose_percentage_sweep() {
    let promo = promo();
    for subtotal in (2_000..12_000).step_by(997) {
        let request = PricingRequest {
            subtotal,
            promo: Some(&promo),
            gift_card: None,
            requested_credit: 0,
            credit_balance: 0,
            shipping_cost: 590,
            free_shipping_threshold: 5_000,
            now: Utc::now(),
        };
        divan::black_box(compose(&request));
    }
}

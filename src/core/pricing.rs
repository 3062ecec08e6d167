//! Checkout pricing
//!
//! Pure composition of coupon discount, gift card value, store credit
//! and shipping into one final charge. No component state is touched;
//! the output is advisory until a payment confirmation arrives, and the
//! decomposed figures tell the confirmation handler exactly how much to
//! debit from which source.

use crate::core::promotions::PromotionCatalog;
use crate::types::{PricingRequest, Quote};

/// Compose a quote from the request's snapshot of the world
///
/// Application order is fixed: promotion first, then gift card against
/// what the promotion left, then store credit against goods before
/// shipping. The caller caps nothing; every figure in the result
/// respects `final_charge >= 0`, `coupon_total <= subtotal` and
/// `credit_for_goods + credit_for_ship <= credit_balance`.
pub fn compose(request: &PricingRequest<'_>) -> Quote {
    let subtotal = request.subtotal.max(0);

    let discount = match request.promo {
        Some(promo) if PromotionCatalog::is_valid(promo, request.now, subtotal) => {
            PromotionCatalog::compute_discount(promo, subtotal).min(subtotal)
        }
        _ => 0,
    };

    let gift_amount = match request.gift_card {
        Some(card) if !card.is_redeemed && card.is_active => {
            let expired = card.expires_at.is_some_and(|at| request.now > at);
            if expired {
                0
            } else {
                card.remaining_balance.min(subtotal - discount).max(0)
            }
        }
        _ => 0,
    };

    let mut shipping = if subtotal >= request.free_shipping_threshold {
        0
    } else {
        request.shipping_cost
    };

    let available = request.credit_balance.max(0);
    let credit_wanted = request
        .requested_credit
        .max(0)
        .min(available)
        .min(subtotal + shipping - discount - gift_amount);

    let remaining_sub = subtotal - discount - gift_amount;
    let (credit_for_goods, credit_for_ship) = if credit_wanted <= remaining_sub {
        (credit_wanted, 0)
    } else {
        let goods = remaining_sub.max(0);
        (goods, credit_wanted - goods)
    };
    shipping = (shipping - credit_for_ship).max(0);

    let coupon_total = discount + gift_amount + credit_for_goods;
    let final_charge = subtotal - coupon_total + shipping;

    Quote {
        final_charge,
        coupon_total,
        shipping,
        discount,
        gift_amount,
        credit_for_goods,
        credit_for_ship,
    }
}

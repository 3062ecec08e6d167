//! Promotion catalog
//!
//! Stores coupon definitions and answers the two questions pricing asks:
//! is this promotion usable right now, and how much does it take off a
//! given subtotal. Usage counting is a separate, guarded mutation so that
//! quoting never consumes a use.

use crate::types::{Amount, CreditError, DiscountType, PromotionCode, PromotionScope};
use crate::types::money::percent_half_up;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Coupon definitions keyed by their printable code
pub struct PromotionCatalog {
    promos: DashMap<String, PromotionCode>,
    next_id: AtomicU64,
}

impl PromotionCatalog {
    pub fn new() -> Self {
        PromotionCatalog {
            promos: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a new promotion under `code`
    ///
    /// The caller is responsible for reserving the code in the registry
    /// first; the catalog only refuses codes it already holds.
    ///
    /// # Errors
    ///
    /// * `Validation` if the discount value is not positive, a percentage
    ///   exceeds 100, or the window is inverted
    /// * `AlreadyUsed` if the catalog already holds `code`
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        code: &str,
        discount_type: DiscountType,
        discount_value: i64,
        min_purchase: Amount,
        max_discount: Option<Amount>,
        usage_limit: Option<u32>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        scope: PromotionScope,
    ) -> Result<PromotionCode, CreditError> {
        if discount_value <= 0 {
            return Err(CreditError::validation(
                "discount_value",
                format!("discount value must be positive, got {discount_value}"),
            ));
        }
        if discount_type == DiscountType::Percentage && discount_value > 100 {
            return Err(CreditError::validation(
                "discount_value",
                format!("percentage cannot exceed 100, got {discount_value}"),
            ));
        }
        if ends_at <= starts_at {
            return Err(CreditError::validation(
                "ends_at",
                "validity window must end after it starts",
            ));
        }

        let promo = PromotionCode {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            code: code.to_string(),
            discount_type,
            discount_value,
            min_purchase,
            max_discount,
            usage_limit,
            usage_count: 0,
            starts_at,
            ends_at,
            is_active: true,
            scope,
        };

        let mut inserted = false;
        self.promos.entry(code.to_string()).or_insert_with(|| {
            inserted = true;
            promo.clone()
        });
        if inserted {
            Ok(promo)
        } else {
            Err(CreditError::already_used("promotion", code))
        }
    }

    /// Snapshot a promotion by code
    pub fn lookup(&self, code: &str) -> Option<PromotionCode> {
        self.promos.get(code).map(|promo| promo.value().clone())
    }

    /// Whether `promo` may be applied to a cart totalling `cart_total`
    ///
    /// Checks the kill switch, the validity window, the usage budget and
    /// the purchase minimum. An invalid promotion contributes a discount
    /// of zero; it is never an error at pricing time.
    pub fn is_valid(promo: &PromotionCode, now: DateTime<Utc>, cart_total: Amount) -> bool {
        if !promo.is_active {
            return false;
        }
        if now < promo.starts_at || now > promo.ends_at {
            return false;
        }
        if let Some(limit) = promo.usage_limit {
            if promo.usage_count >= limit {
                return false;
            }
        }
        cart_total >= promo.min_purchase
    }

    /// The amount `promo` takes off `subtotal`, before clamping to it
    ///
    /// Percentage discounts round half away from zero and honour the
    /// promotion's cap; fixed discounts never exceed the subtotal.
    pub fn compute_discount(promo: &PromotionCode, subtotal: Amount) -> Amount {
        match promo.discount_type {
            DiscountType::Percentage => {
                let raw = percent_half_up(subtotal, promo.discount_value).unwrap_or(0);
                match promo.max_discount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            DiscountType::Fixed => promo.discount_value.min(subtotal),
        }
    }

    /// Consume one use of `code`
    ///
    /// Runs under the promotion's entry lock so two confirmations cannot
    /// both take the last slot of a limited promotion.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the catalog does not hold `code`
    /// * `AlreadyUsed` if the usage budget is spent
    pub fn record_usage(&self, code: &str) -> Result<(), CreditError> {
        let mut promo = self
            .promos
            .get_mut(code)
            .ok_or_else(|| CreditError::not_found("promotion", code))?;

        if let Some(limit) = promo.usage_limit {
            if promo.usage_count >= limit {
                return Err(CreditError::already_used("promotion", code));
            }
        }
        promo.usage_count += 1;
        Ok(())
    }

    /// Admin kill switch for a promotion
    ///
    /// # Errors
    ///
    /// * `NotFound` if the catalog does not hold `code`
    pub fn deactivate(&self, code: &str) -> Result<(), CreditError> {
        let mut promo = self
            .promos
            .get_mut(code)
            .ok_or_else(|| CreditError::not_found("promotion", code))?;
        promo.is_active = false;
        Ok(())
    }
}

impl Default for PromotionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn ten_percent(now: DateTime<Utc>) -> PromotionCode {
        PromotionCode {
            id: 1,
            code: "WELCOME10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            min_purchase: 2_000,
            max_discount: None,
            usage_limit: None,
            usage_count: 0,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
            scope: PromotionScope::All,
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let catalog = PromotionCatalog::new();
        let now = Utc::now();

        let promo = catalog
            .create(
                "SAVE500",
                DiscountType::Fixed,
                500,
                0,
                None,
                Some(100),
                now,
                now + Duration::days(7),
                PromotionScope::All,
            )
            .unwrap();

        assert_eq!(promo.usage_count, 0);
        assert_eq!(catalog.lookup("SAVE500").unwrap().id, promo.id);
        assert!(catalog.lookup("MISSING").is_none());
    }

    #[test]
    fn test_create_rejects_duplicate_code() {
        let catalog = PromotionCatalog::new();
        let now = Utc::now();
        let window = (now, now + Duration::days(7));

        catalog
            .create(
                "SAVE500",
                DiscountType::Fixed,
                500,
                0,
                None,
                None,
                window.0,
                window.1,
                PromotionScope::All,
            )
            .unwrap();
        let result = catalog.create(
            "SAVE500",
            DiscountType::Fixed,
            300,
            0,
            None,
            None,
            window.0,
            window.1,
            PromotionScope::All,
        );

        assert!(matches!(
            result.unwrap_err(),
            CreditError::AlreadyUsed { .. }
        ));
    }

    #[rstest]
    #[case::zero_value(DiscountType::Fixed, 0)]
    #[case::negative_value(DiscountType::Fixed, -100)]
    #[case::percent_over_hundred(DiscountType::Percentage, 101)]
    fn test_create_rejects_bad_value(#[case] kind: DiscountType, #[case] value: i64) {
        let catalog = PromotionCatalog::new();
        let now = Utc::now();

        let result = catalog.create(
            "BAD",
            kind,
            value,
            0,
            None,
            None,
            now,
            now + Duration::days(1),
            PromotionScope::All,
        );

        assert!(matches!(
            result.unwrap_err(),
            CreditError::Validation { field: "discount_value", .. }
        ));
    }

    #[test]
    fn test_create_rejects_inverted_window() {
        let catalog = PromotionCatalog::new();
        let now = Utc::now();

        let result = catalog.create(
            "BAD",
            DiscountType::Fixed,
            100,
            0,
            None,
            None,
            now,
            now - Duration::days(1),
            PromotionScope::All,
        );

        assert!(matches!(
            result.unwrap_err(),
            CreditError::Validation { field: "ends_at", .. }
        ));
    }

    #[test]
    fn test_is_valid_checks_window_flag_budget_and_minimum() {
        let now = Utc::now();
        let promo = ten_percent(now);

        assert!(PromotionCatalog::is_valid(&promo, now, 5_000));
        // Below the purchase minimum.
        assert!(!PromotionCatalog::is_valid(&promo, now, 1_999));
        // Outside the window.
        assert!(!PromotionCatalog::is_valid(
            &promo,
            now + Duration::days(2),
            5_000
        ));
        assert!(!PromotionCatalog::is_valid(
            &promo,
            now - Duration::days(2),
            5_000
        ));

        let mut killed = promo.clone();
        killed.is_active = false;
        assert!(!PromotionCatalog::is_valid(&killed, now, 5_000));

        let mut spent = promo;
        spent.usage_limit = Some(3);
        spent.usage_count = 3;
        assert!(!PromotionCatalog::is_valid(&spent, now, 5_000));
    }

    #[rstest]
    #[case::ten_percent(10_000, 1_000)]
    #[case::rounds_half_up(125, 13)]
    #[case::zero_subtotal(0, 0)]
    fn test_percentage_discount(#[case] subtotal: Amount, #[case] expected: Amount) {
        let promo = ten_percent(Utc::now());
        assert_eq!(PromotionCatalog::compute_discount(&promo, subtotal), expected);
    }

    #[test]
    fn test_percentage_discount_honours_cap() {
        let mut promo = ten_percent(Utc::now());
        promo.max_discount = Some(300);

        assert_eq!(PromotionCatalog::compute_discount(&promo, 10_000), 300);
        assert_eq!(PromotionCatalog::compute_discount(&promo, 2_000), 200);
    }

    #[test]
    fn test_fixed_discount_never_exceeds_subtotal() {
        let promo = PromotionCode {
            discount_type: DiscountType::Fixed,
            discount_value: 500,
            ..ten_percent(Utc::now())
        };

        assert_eq!(PromotionCatalog::compute_discount(&promo, 10_000), 500);
        assert_eq!(PromotionCatalog::compute_discount(&promo, 300), 300);
    }

    #[test]
    fn test_record_usage_counts_and_stops_at_limit() {
        let catalog = PromotionCatalog::new();
        let now = Utc::now();
        catalog
            .create(
                "LIMITED",
                DiscountType::Fixed,
                100,
                0,
                None,
                Some(2),
                now,
                now + Duration::days(1),
                PromotionScope::All,
            )
            .unwrap();

        catalog.record_usage("LIMITED").unwrap();
        catalog.record_usage("LIMITED").unwrap();
        let third = catalog.record_usage("LIMITED");

        assert!(matches!(
            third.unwrap_err(),
            CreditError::AlreadyUsed { .. }
        ));
        assert_eq!(catalog.lookup("LIMITED").unwrap().usage_count, 2);
    }

    #[test]
    fn test_record_usage_unknown_code() {
        let catalog = PromotionCatalog::new();
        let result = catalog.record_usage("MISSING");
        assert!(matches!(result.unwrap_err(), CreditError::NotFound { .. }));
    }

    #[test]
    fn test_deactivate_flips_validity() {
        let catalog = PromotionCatalog::new();
        let now = Utc::now();
        catalog
            .create(
                "KILLME",
                DiscountType::Fixed,
                100,
                0,
                None,
                None,
                now - Duration::days(1),
                now + Duration::days(1),
                PromotionScope::All,
            )
            .unwrap();

        catalog.deactivate("KILLME").unwrap();
        let promo = catalog.lookup("KILLME").unwrap();
        assert!(!PromotionCatalog::is_valid(&promo, now, 10_000));
    }
}

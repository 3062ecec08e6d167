//! Checkout engine
//!
//! Composition root wiring the registry, ledger, vault, catalog and
//! referral machinery together, and home of the payment-confirmation
//! handler: quoting is pure and free, state changes happen exactly once
//! per confirmed payment.

use crate::config::Policy;
use crate::core::code_registry::{CodeRegistry, RegistrationReason};
use crate::core::gift_vault::GiftCardVault;
use crate::core::ledger::LedgerStore;
use crate::core::pricing;
use crate::core::promotions::PromotionCatalog;
use crate::core::referrals::{ReferralStateMachine, RevokeOutcome};
use crate::types::{
    Amount, CreditError, CreditTransaction, DiscountType, OrderId, PaymentConfirmation,
    PricingRequest, PromotionCode, PromotionScope, Quote, ReferralCode, ReferralRelationship,
    TransactionKind, UserId,
};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, Entry};
use std::sync::Arc;

/// The full store-credit and discount engine behind a checkout
pub struct CheckoutEngine {
    registry: Arc<CodeRegistry>,
    ledger: Arc<LedgerStore>,
    vault: Arc<GiftCardVault>,
    catalog: Arc<PromotionCatalog>,
    referrals: Arc<ReferralStateMachine>,
    policy: Policy,
    /// Confirmed payment ids, the webhook's idempotency key
    processed_payments: DashMap<String, ()>,
}

impl CheckoutEngine {
    /// Wire up a fresh engine under `policy`
    pub fn new(policy: Policy) -> Self {
        let registry = Arc::new(CodeRegistry::new());
        let ledger = Arc::new(LedgerStore::new());
        let catalog = Arc::new(PromotionCatalog::new());
        let vault = Arc::new(GiftCardVault::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            policy.gift_code_len,
        ));
        let referrals = Arc::new(ReferralStateMachine::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            Arc::clone(&catalog),
            policy.clone(),
        ));
        CheckoutEngine {
            registry,
            ledger,
            vault,
            catalog,
            referrals,
            policy,
            processed_payments: DashMap::new(),
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn vault(&self) -> &GiftCardVault {
        &self.vault
    }

    pub fn catalog(&self) -> &PromotionCatalog {
        &self.catalog
    }

    pub fn referrals(&self) -> &ReferralStateMachine {
        &self.referrals
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Register a user: enroll them in the referral program and, if they
    /// presented someone's code, open the pending relationship
    ///
    /// # Errors
    ///
    /// Enrollment errors plus everything
    /// [`ReferralStateMachine::create_relationship`] rejects.
    pub fn register_user(
        &self,
        user: UserId,
        presented_code: Option<&str>,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> Result<(ReferralCode, Option<ReferralRelationship>), CreditError> {
        let (code, _) = self.referrals.enroll(user, now)?;
        let relationship = match presented_code {
            Some(presented) => Some(
                self.referrals
                    .create_relationship(presented, user, ip_address, now)?,
            ),
            None => None,
        };
        Ok((code, relationship))
    }

    /// Admin path: mint a promotion, burning its code in the registry
    ///
    /// # Errors
    ///
    /// * `AlreadyUsed` if the code was ever issued for anything
    /// * catalog validation errors
    #[allow(clippy::too_many_arguments)]
    pub fn create_promotion(
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
        self.registry.reserve(code, RegistrationReason::Reserved)?;
        self.catalog.create(
            code,
            discount_type,
            discount_value,
            min_purchase,
            max_discount,
            usage_limit,
            starts_at,
            ends_at,
            scope,
        )
    }

    /// Price a checkout without touching any state
    ///
    /// Unknown promo or gift-card codes simply contribute nothing; a
    /// quote is advisory and must never fail on stale input.
    pub fn quote(
        &self,
        user: UserId,
        subtotal: Amount,
        promo_code: Option<&str>,
        gift_code: Option<&str>,
        requested_credit: Amount,
        now: DateTime<Utc>,
    ) -> Quote {
        let promo = promo_code.and_then(|code| self.catalog.lookup(code));
        let gift_card = gift_code.and_then(|code| self.vault.lookup(code));
        pricing::compose(&PricingRequest {
            subtotal,
            promo: promo.as_ref(),
            gift_card: gift_card.as_ref(),
            requested_credit,
            credit_balance: self.ledger.balance(user),
            shipping_cost: self.policy.shipping_cost,
            free_shipping_threshold: self.policy.free_shipping_threshold,
            now,
        })
    }

    /// Apply a confirmed payment's side effects exactly once
    ///
    /// Webhooks retry, so the whole handler is keyed by `payment_id`:
    /// a repeat delivery of an applied payment returns `Ok` without
    /// touching anything, and a duplicate racing an in-flight delivery
    /// blocks on its entry until that delivery resolves. The payment id
    /// is only recorded once every step succeeded, so a failed delivery
    /// leaves the payment unmarked and the processor's retry gets a
    /// clean attempt. Within one delivery the steps run in a fixed order
    /// (gift-card redemption, referral conversion, credit debit, promo
    /// usage), each individually idempotent so a crashed half-applied
    /// delivery can be re-run.
    ///
    /// # Errors
    ///
    /// Any step's error aborts the handler with the payment unmarked.
    pub fn confirm_payment(
        &self,
        confirmation: &PaymentConfirmation,
        now: DateTime<Utc>,
    ) -> Result<(), CreditError> {
        // The vacant entry is held across the application so a duplicate
        // delivery cannot observe the payment as processed before its
        // effects are in place; none of the inner steps touch this map.
        match self.processed_payments.entry(confirmation.payment_id.clone()) {
            Entry::Occupied(_) => {
                tracing::info!(payment = %confirmation.payment_id, "duplicate confirmation ignored");
                Ok(())
            }
            Entry::Vacant(slot) => {
                self.apply_confirmation(confirmation, now)?;
                slot.insert(());
                Ok(())
            }
        }
    }

    fn apply_confirmation(
        &self,
        confirmation: &PaymentConfirmation,
        now: DateTime<Utc>,
    ) -> Result<(), CreditError> {
        let quote = &confirmation.quote;

        if let Some(token) = &confirmation.gift_qr_token {
            match self.vault.redeem(token, confirmation.user, now) {
                Ok(_) => {}
                // A previous half-applied delivery already redeemed it.
                Err(CreditError::AlreadyUsed { .. }) => {}
                Err(error) => return Err(error),
            }
        }

        self.referrals
            .convert(confirmation.user, confirmation.order_id, confirmation.subtotal, now)?;

        let spent = quote.gift_amount + quote.credit_for_goods + quote.credit_for_ship;
        if spent > 0 {
            self.ledger.debit(
                confirmation.user,
                spent,
                TransactionKind::PurchaseDebit,
                confirmation.order_id,
                now,
            )?;
        }

        if quote.discount > 0 {
            if let Some(code) = &confirmation.promo_code {
                match self.catalog.record_usage(code) {
                    Ok(()) => {}
                    Err(error) => {
                        // Not worth failing the whole confirmation over.
                        tracing::warn!(promo = %code, %error, "promo usage not recorded");
                    }
                }
            }
        }

        tracing::info!(
            payment = %confirmation.payment_id,
            user = confirmation.user,
            order = confirmation.order_id,
            charged = quote.final_charge,
            "payment confirmation applied"
        );
        Ok(())
    }

    /// Credit a refund back as store credit and revoke any referral
    /// reward the refunded order paid out
    ///
    /// # Errors
    ///
    /// Ledger validation or overflow errors.
    pub fn process_refund(
        &self,
        user: UserId,
        order: OrderId,
        amount: Amount,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, CreditError> {
        self.ledger
            .credit(user, amount, TransactionKind::RefundCredit, order, now)?;
        self.referrals.revoke(order, reason, now)
    }

    /// Support tooling: adjust a balance by a signed amount
    ///
    /// Positive amounts credit, negative amounts deduct and may push the
    /// balance negative, matching the revocation exception.
    ///
    /// # Errors
    ///
    /// * `Validation` if `amount` is zero
    /// * ledger overflow errors
    pub fn admin_adjust(
        &self,
        user: UserId,
        amount: Amount,
        reference: u64,
        now: DateTime<Utc>,
    ) -> Result<CreditTransaction, CreditError> {
        if amount > 0 {
            self.ledger
                .credit(user, amount, TransactionKind::AdminAdjustment, reference, now)
        } else if amount < 0 {
            self.ledger
                .reverse(user, -amount, TransactionKind::AdminAdjustment, reference, now)
        } else {
            Err(CreditError::validation(
                "amount",
                "adjustment amount cannot be zero",
            ))
        }
    }
}

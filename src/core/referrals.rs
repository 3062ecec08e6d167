//! Referral lifecycle
//!
//! Drives relationships through pending -> converted -> revoked, credits
//! rewards through the ledger, and applies the anti-abuse policy (no
//! self-referral, one relationship per referee, an order minimum and a
//! per-IP daily cap).
//!
//! A referee's relationship row is the unit of locking: conversion and
//! revocation each mutate it exactly once under its entry lock, so a
//! referee consumes at most one conversion no matter how many checkouts
//! race.

use crate::config::Policy;
use crate::core::code_registry::CodeRegistry;
use crate::core::ledger::LedgerStore;
use crate::core::promotions::PromotionCatalog;
use crate::types::{
    Amount, CreditError, DiscountType, OrderId, PromotionCode, PromotionScope, ReferralCode,
    ReferralRelationship, ReferralStatus, TransactionKind, UserId,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What `convert` did with a referee's first paid order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The referee has no pending relationship; nothing to do
    NoPendingReferral,
    /// Converted without reward: the order was below the policy minimum
    MinimumNotMet,
    /// Converted without reward: the relationship's IP hit the daily cap
    IpLimitExceeded,
    /// Converted and the referrer was credited
    Rewarded { referrer: UserId, amount: Amount },
}

/// What `revoke` did with a refunded order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// No credited conversion keyed by that order; nothing to reverse
    NoRewardToRevoke,
    /// The refund arrived past the revocation window; reward kept
    OutsideWindow,
    /// Reward pulled back from the referrer
    Revoked { referrer: UserId, amount: Amount },
}

/// Referral codes, relationships and their reward bookkeeping
pub struct ReferralStateMachine {
    registry: Arc<CodeRegistry>,
    ledger: Arc<LedgerStore>,
    catalog: Arc<PromotionCatalog>,
    policy: Policy,
    /// One permanent code per user
    codes: DashMap<UserId, ReferralCode>,
    /// Printable code -> owning user
    by_code: DashMap<String, UserId>,
    /// At most one relationship per referee, ever
    relationships: DashMap<UserId, ReferralRelationship>,
    /// Converted order -> referee, for refund-driven revocation
    by_order: DashMap<OrderId, UserId>,
    /// Credited conversion timestamps per IP, pruned to the trailing day
    ip_conversions: DashMap<String, Vec<DateTime<Utc>>>,
    next_relationship_id: AtomicU64,
}

impl ReferralStateMachine {
    pub fn new(
        registry: Arc<CodeRegistry>,
        ledger: Arc<LedgerStore>,
        catalog: Arc<PromotionCatalog>,
        policy: Policy,
    ) -> Self {
        ReferralStateMachine {
            registry,
            ledger,
            catalog,
            policy,
            codes: DashMap::new(),
            by_code: DashMap::new(),
            relationships: DashMap::new(),
            by_order: DashMap::new(),
            ip_conversions: DashMap::new(),
            next_relationship_id: AtomicU64::new(1),
        }
    }

    /// Give `user` their permanent referral code
    ///
    /// Also mints the companion first-order discount promotion that new
    /// referees can apply at checkout. Enrolling twice returns the
    /// existing code untouched.
    ///
    /// # Errors
    ///
    /// * `CodeSpaceExhausted` if code generation ran out of attempts
    pub fn enroll(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(ReferralCode, Option<PromotionCode>), CreditError> {
        if let Some(existing) = self.codes.get(&user) {
            return Ok((existing.value().clone(), None));
        }

        let code = self
            .registry
            .issue_code(self.policy.referral_code_len, Some(user))?;
        let referral = ReferralCode {
            owner: user,
            code: code.clone(),
            is_active: true,
            total_referrals: 0,
            total_conversions: 0,
            total_earned: 0,
            created_at: now,
        };

        let mut inserted = false;
        let stored = self
            .codes
            .entry(user)
            .or_insert_with(|| {
                inserted = true;
                referral
            })
            .value()
            .clone();
        if !inserted {
            // Lost the race to a concurrent enroll; the generated code
            // stays burned in the registry but is never handed out.
            return Ok((stored, None));
        }
        self.by_code.insert(code, user);

        let promo_code = self
            .registry
            .issue_code(self.policy.referral_code_len, Some(user))?;
        let promo = self.catalog.create(
            &promo_code,
            DiscountType::Percentage,
            self.policy.first_order_discount_percent,
            self.policy.min_order_subtotal,
            None,
            Some(1),
            now,
            now + Duration::days(self.policy.first_order_promo_days),
            PromotionScope::All,
        )?;

        tracing::info!(user, code = %stored.code, promo = %promo.code, "referral enrollment");
        Ok((stored, Some(promo)))
    }

    /// Record that `referee` signed up through `code`
    ///
    /// Creates the pending relationship. A referee gets at most one
    /// relationship ever, and never through their own code.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the code resolves to no referral code
    /// * `Inactive` if the owning account is suspended
    /// * `SelfReferral` if the code belongs to the referee
    /// * `AlreadyUsed` if the referee already has a relationship
    pub fn create_relationship(
        &self,
        code: &str,
        referee: UserId,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> Result<ReferralRelationship, CreditError> {
        let referrer = *self
            .by_code
            .get(code)
            .ok_or_else(|| CreditError::not_found("referral code", code))?
            .value();

        {
            let owner = self
                .codes
                .get(&referrer)
                .ok_or_else(|| CreditError::not_found("referral code", code))?;
            if !owner.is_active {
                return Err(CreditError::inactive("referral code", code));
            }
        }
        if referrer == referee {
            return Err(CreditError::SelfReferral { user: referee });
        }

        let relationship = ReferralRelationship {
            id: self.next_relationship_id.fetch_add(1, Ordering::Relaxed),
            referrer,
            referee,
            code: code.to_string(),
            status: ReferralStatus::Pending,
            reward_amount: self.policy.referral_reward,
            reward_credited: false,
            ip_address: ip_address.to_string(),
            converted_order: None,
            converted_at: None,
            revoked_at: None,
            revoke_reason: None,
            created_at: now,
        };

        let mut inserted = false;
        let stored = self
            .relationships
            .entry(referee)
            .or_insert_with(|| {
                inserted = true;
                relationship
            })
            .value()
            .clone();
        if !inserted {
            return Err(CreditError::already_used(
                "referral relationship",
                referee.to_string(),
            ));
        }

        if let Some(mut owner) = self.codes.get_mut(&referrer) {
            owner.total_referrals += 1;
        }
        Ok(stored)
    }

    /// Consume the referee's pending relationship on their first paid order
    ///
    /// The relationship converts exactly once regardless of outcome: an
    /// order below the policy minimum or an IP past the daily cap still
    /// burns the conversion, only without crediting the reward.
    ///
    /// # Errors
    ///
    /// * `Overflow` if crediting the reward would overflow the referrer's
    ///   ledger counters
    pub fn convert(
        &self,
        referee: UserId,
        order: OrderId,
        order_subtotal: Amount,
        now: DateTime<Utc>,
    ) -> Result<ConversionOutcome, CreditError> {
        let mut entry = match self.relationships.get_mut(&referee) {
            Some(entry) if entry.status == ReferralStatus::Pending => entry,
            _ => return Ok(ConversionOutcome::NoPendingReferral),
        };

        if order_subtotal < self.policy.min_order_subtotal {
            entry.status = ReferralStatus::Converted;
            entry.reward_credited = false;
            entry.converted_order = Some(order);
            entry.converted_at = Some(now);
            tracing::info!(
                referee,
                order,
                subtotal = order_subtotal,
                "referral converted without reward: below order minimum"
            );
            return Ok(ConversionOutcome::MinimumNotMet);
        }

        if self.credited_for_ip(&entry.ip_address, now) >= self.policy.ip_daily_cap {
            entry.status = ReferralStatus::Converted;
            entry.reward_credited = false;
            entry.converted_order = Some(order);
            entry.converted_at = Some(now);
            tracing::warn!(
                referee,
                order,
                ip = %entry.ip_address,
                "referral converted without reward: ip daily cap reached"
            );
            return Ok(ConversionOutcome::IpLimitExceeded);
        }

        let referrer = entry.referrer;
        let amount = entry.reward_amount;
        self.ledger.credit(
            referrer,
            amount,
            TransactionKind::ReferralReward,
            entry.id,
            now,
        )?;

        entry.status = ReferralStatus::Converted;
        entry.reward_credited = true;
        entry.converted_order = Some(order);
        entry.converted_at = Some(now);

        self.by_order.insert(order, referee);
        self.record_ip_conversion(&entry.ip_address, now);
        if let Some(mut owner) = self.codes.get_mut(&referrer) {
            owner.total_conversions = owner.total_conversions.saturating_add(1);
            owner.total_earned = owner.total_earned.saturating_add(amount);
        }

        tracing::info!(referee, referrer, order, amount, "referral reward credited");
        Ok(ConversionOutcome::Rewarded { referrer, amount })
    }

    /// Pull back a credited reward after the rewarded order was refunded
    ///
    /// Only credited conversions inside the policy window are reversed.
    /// The reversal may push the referrer's balance negative if the
    /// credit was already spent; the ledger records it either way.
    pub fn revoke(
        &self,
        order: OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, CreditError> {
        let referee = match self.by_order.get(&order) {
            Some(entry) => *entry.value(),
            None => return Ok(RevokeOutcome::NoRewardToRevoke),
        };
        let mut entry = match self.relationships.get_mut(&referee) {
            Some(entry)
                if entry.status == ReferralStatus::Converted && entry.reward_credited =>
            {
                entry
            }
            _ => return Ok(RevokeOutcome::NoRewardToRevoke),
        };

        let converted_at = match entry.converted_at {
            Some(at) => at,
            None => return Ok(RevokeOutcome::NoRewardToRevoke),
        };
        if now - converted_at > self.policy.revoke_window() {
            tracing::info!(order, "refund outside revocation window; reward kept");
            return Ok(RevokeOutcome::OutsideWindow);
        }

        let referrer = entry.referrer;
        let amount = entry.reward_amount;
        self.ledger.reverse(
            referrer,
            amount,
            TransactionKind::ReferralRevoked,
            entry.id,
            now,
        )?;

        entry.status = ReferralStatus::Revoked;
        entry.revoked_at = Some(now);
        entry.revoke_reason = Some(reason.to_string());

        if let Some(mut owner) = self.codes.get_mut(&referrer) {
            owner.total_conversions = owner.total_conversions.saturating_sub(1);
            owner.total_earned = (owner.total_earned - amount).max(0);
        }

        tracing::info!(order, referrer, amount, reason, "referral reward revoked");
        Ok(RevokeOutcome::Revoked { referrer, amount })
    }

    /// Flip a suspended user's code inactive; the code is never reassigned
    ///
    /// # Errors
    ///
    /// * `NotFound` if the user never enrolled
    pub fn suspend(&self, user: UserId) -> Result<(), CreditError> {
        let mut code = self
            .codes
            .get_mut(&user)
            .ok_or_else(|| CreditError::not_found("referral code", user.to_string()))?;
        code.is_active = false;
        Ok(())
    }

    /// Snapshot a user's referral code
    pub fn code_of(&self, user: UserId) -> Option<ReferralCode> {
        self.codes.get(&user).map(|code| code.value().clone())
    }

    /// Snapshot a referee's relationship
    pub fn relationship_of(&self, referee: UserId) -> Option<ReferralRelationship> {
        self.relationships
            .get(&referee)
            .map(|entry| entry.value().clone())
    }

    fn credited_for_ip(&self, ip_address: &str, now: DateTime<Utc>) -> u32 {
        let cutoff = now - Duration::hours(24);
        match self.ip_conversions.get(ip_address) {
            Some(stamps) => stamps.iter().filter(|at| **at > cutoff).count() as u32,
            None => 0,
        }
    }

    fn record_ip_conversion(&self, ip_address: &str, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(24);
        let mut stamps = self
            .ip_conversions
            .entry(ip_address.to_string())
            .or_default();
        stamps.retain(|at| *at > cutoff);
        stamps.push(now);
    }
}

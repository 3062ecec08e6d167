//! Store-credit ledger
//!
//! The single source of truth for "how much credit does user X have". Each
//! user owns one balance row plus an append-only transaction log; every
//! mutation locks the row, moves the balance with checked arithmetic, and
//! appends the audit row in the same critical section.
//!
//! # Idempotency
//!
//! Every mutation is keyed by `(kind, reference_id)`. A second call with
//! the same key returns a copy of the original transaction and changes
//! nothing, which makes retried payment webhooks harmless.
//!
//! # Locking
//!
//! The per-user `DashMap` entry lock stands in for the row-level exclusive
//! lock a relational backing store would take. Balance read, mutation and
//! log append all happen while the entry is held, so concurrent credits
//! and debits on one user serialize and `balance_before`/`balance_after`
//! chain exactly.

use crate::types::{
    Amount, CreditError, CreditTransaction, StoreCredit, TransactionKind, UserId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-user ledger state guarded by one entry lock
#[derive(Debug)]
struct CreditAccount {
    credit: StoreCredit,
    log: Vec<CreditTransaction>,
    /// `(kind, reference_id)` of every row in `log`, for dedup
    applied: HashMap<(TransactionKind, u64), usize>,
}

impl CreditAccount {
    fn new(user: UserId) -> Self {
        CreditAccount {
            credit: StoreCredit::new(user),
            log: Vec::new(),
            applied: HashMap::new(),
        }
    }

    fn existing(&self, kind: TransactionKind, reference_id: u64) -> Option<CreditTransaction> {
        self.applied
            .get(&(kind, reference_id))
            .map(|&idx| self.log[idx].clone())
    }

    fn append(
        &mut self,
        id: u64,
        amount: Amount,
        kind: TransactionKind,
        reference_id: u64,
        balance_before: Amount,
        now: DateTime<Utc>,
    ) -> CreditTransaction {
        let row = CreditTransaction {
            id,
            user: self.credit.user,
            amount,
            kind,
            reference_id,
            balance_before,
            balance_after: self.credit.balance,
            timestamp: now,
        };
        self.applied.insert((kind, reference_id), self.log.len());
        self.log.push(row.clone());
        row
    }
}

/// Per-user balances plus the append-only, replayable transaction log
#[derive(Debug, Default)]
pub struct LedgerStore {
    accounts: DashMap<UserId, CreditAccount>,
    next_tx_id: AtomicU64,
}

impl LedgerStore {
    /// Create an empty ledger
    pub fn new() -> Self {
        LedgerStore {
            accounts: DashMap::new(),
            next_tx_id: AtomicU64::new(1),
        }
    }

    /// Credit `amount` to `user`
    ///
    /// Creates the balance row lazily on first credit. Idempotent on
    /// `(kind, reference_id)`.
    ///
    /// # Errors
    ///
    /// * `Validation` if `amount` is not strictly positive
    /// * `Overflow` if the balance or lifetime counter cannot hold the sum
    pub fn credit(
        &self,
        user: UserId,
        amount: Amount,
        kind: TransactionKind,
        reference_id: u64,
        now: DateTime<Utc>,
    ) -> Result<CreditTransaction, CreditError> {
        if amount <= 0 {
            return Err(CreditError::validation(
                "amount",
                format!("credit must be positive, got {amount}"),
            ));
        }

        let mut account = self
            .accounts
            .entry(user)
            .or_insert_with(|| CreditAccount::new(user));

        if let Some(original) = account.existing(kind, reference_id) {
            tracing::debug!(user, ?kind, reference_id, "duplicate credit ignored");
            return Ok(original);
        }

        let balance_before = account.credit.balance;
        let new_balance = balance_before
            .checked_add(amount)
            .ok_or_else(|| CreditError::overflow("credit", user))?;
        let new_earned = account
            .credit
            .total_earned
            .checked_add(amount)
            .ok_or_else(|| CreditError::overflow("credit", user))?;

        account.credit.balance = new_balance;
        account.credit.total_earned = new_earned;

        let id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        Ok(account.append(id, amount, kind, reference_id, balance_before, now))
    }

    /// Debit `amount` from `user`
    ///
    /// Never partially succeeds: either the full amount is available or
    /// the balance is untouched. Idempotent on `(kind, reference_id)`.
    ///
    /// # Errors
    ///
    /// * `Validation` if `amount` is not strictly positive
    /// * `InsufficientBalance` if the balance cannot cover the debit
    pub fn debit(
        &self,
        user: UserId,
        amount: Amount,
        kind: TransactionKind,
        reference_id: u64,
        now: DateTime<Utc>,
    ) -> Result<CreditTransaction, CreditError> {
        if amount <= 0 {
            return Err(CreditError::validation(
                "amount",
                format!("debit must be positive, got {amount}"),
            ));
        }

        let mut account = self
            .accounts
            .entry(user)
            .or_insert_with(|| CreditAccount::new(user));

        if let Some(original) = account.existing(kind, reference_id) {
            tracing::debug!(user, ?kind, reference_id, "duplicate debit ignored");
            return Ok(original);
        }

        let balance_before = account.credit.balance;
        if balance_before < amount {
            return Err(CreditError::insufficient_balance(
                user,
                balance_before,
                amount,
            ));
        }

        let new_spent = account
            .credit
            .total_spent
            .checked_add(amount)
            .ok_or_else(|| CreditError::overflow("debit", user))?;
        account.credit.balance = balance_before - amount;
        account.credit.total_spent = new_spent;

        let id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        Ok(account.append(id, -amount, kind, reference_id, balance_before, now))
    }

    /// Reverse previously credited value, allowing the balance to go
    /// negative
    ///
    /// The revocation-only entry point: a referral reward being clawed
    /// back is a retroactive correction, not a spend, and the referrer may
    /// have already spent the credit. The resulting debt is carried (and
    /// blocks further [`debit`](Self::debit)s) until new credit arrives.
    /// Idempotent on `(kind, reference_id)` like every other mutation.
    pub fn reverse(
        &self,
        user: UserId,
        amount: Amount,
        kind: TransactionKind,
        reference_id: u64,
        now: DateTime<Utc>,
    ) -> Result<CreditTransaction, CreditError> {
        if amount <= 0 {
            return Err(CreditError::validation(
                "amount",
                format!("reversal must be positive, got {amount}"),
            ));
        }

        let mut account = self
            .accounts
            .entry(user)
            .or_insert_with(|| CreditAccount::new(user));

        if let Some(original) = account.existing(kind, reference_id) {
            tracing::debug!(user, ?kind, reference_id, "duplicate reversal ignored");
            return Ok(original);
        }

        let balance_before = account.credit.balance;
        let new_balance = balance_before
            .checked_sub(amount)
            .ok_or_else(|| CreditError::overflow("reverse", user))?;
        let new_spent = account
            .credit
            .total_spent
            .checked_add(amount)
            .ok_or_else(|| CreditError::overflow("reverse", user))?;

        account.credit.balance = new_balance;
        account.credit.total_spent = new_spent;

        if new_balance < 0 {
            tracing::warn!(user, balance = new_balance, "reversal left a negative balance");
        }

        let id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        Ok(account.append(id, -amount, kind, reference_id, balance_before, now))
    }

    /// Current spendable balance, zero for users with no credit row
    pub fn balance(&self, user: UserId) -> Amount {
        self.accounts
            .get(&user)
            .map(|account| account.credit.balance)
            .unwrap_or(0)
    }

    /// Snapshot of a user's balance row, if one exists
    pub fn credit_summary(&self, user: UserId) -> Option<StoreCredit> {
        self.accounts
            .get(&user)
            .map(|account| account.credit.clone())
    }

    /// Full transaction history for a user, oldest first
    ///
    /// The admin/support read path for dispute resolution.
    pub fn transactions(&self, user: UserId) -> Vec<CreditTransaction> {
        self.accounts
            .get(&user)
            .map(|account| account.log.clone())
            .unwrap_or_default()
    }

    /// Recompute the balance by replaying the transaction log
    ///
    /// The audit primitive behind the ledger-consistency property: the
    /// result must always equal [`balance`](Self::balance).
    pub fn replayed_balance(&self, user: UserId) -> Amount {
        self.transactions(user).iter().map(|tx| tx.amount).sum()
    }

    /// Verify the per-user audit chain
    ///
    /// True iff every row's `balance_after` equals the next row's
    /// `balance_before` and the replayed sum matches the live balance.
    pub fn replay_consistent(&self, user: UserId) -> bool {
        let log = self.transactions(user);
        let chained = log
            .windows(2)
            .all(|pair| pair[0].balance_after == pair[1].balance_before);
        chained && self.replayed_balance(user) == self.balance(user)
    }

    /// All balance rows, sorted by user id for deterministic output
    pub fn all_credit_summaries(&self) -> Vec<StoreCredit> {
        let mut rows: Vec<StoreCredit> = self
            .accounts
            .iter()
            .map(|entry| entry.value().credit.clone())
            .collect();
        rows.sort_by_key(|row| row.user);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_credit_creates_account_lazily() {
        let ledger = LedgerStore::new();

        let tx = ledger
            .credit(1, 1_000, TransactionKind::GiftCardRedeem, 10, now())
            .unwrap();

        assert_eq!(tx.amount, 1_000);
        assert_eq!(tx.balance_before, 0);
        assert_eq!(tx.balance_after, 1_000);
        assert_eq!(ledger.balance(1), 1_000);

        let summary = ledger.credit_summary(1).unwrap();
        assert_eq!(summary.total_earned, 1_000);
        assert_eq!(summary.total_spent, 0);
    }

    #[test]
    fn test_credit_rejects_non_positive_amount() {
        let ledger = LedgerStore::new();

        for amount in [0, -500] {
            let result = ledger.credit(1, amount, TransactionKind::AdminAdjustment, 1, now());
            assert!(matches!(
                result.unwrap_err(),
                CreditError::Validation { field: "amount", .. }
            ));
        }
        assert!(ledger.credit_summary(1).is_none());
    }

    #[test]
    fn test_debit_requires_sufficient_balance() {
        let ledger = LedgerStore::new();
        ledger
            .credit(1, 500, TransactionKind::GiftCardRedeem, 10, now())
            .unwrap();

        let result = ledger.debit(1, 1_000, TransactionKind::PurchaseDebit, 77, now());

        assert_eq!(
            result.unwrap_err(),
            CreditError::insufficient_balance(1, 500, 1_000)
        );
        // No partial debit.
        assert_eq!(ledger.balance(1), 500);
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[test]
    fn test_debit_updates_balance_and_counters() {
        let ledger = LedgerStore::new();
        ledger
            .credit(1, 2_000, TransactionKind::GiftCardRedeem, 10, now())
            .unwrap();

        let tx = ledger
            .debit(1, 1_500, TransactionKind::PurchaseDebit, 77, now())
            .unwrap();

        assert_eq!(tx.amount, -1_500);
        assert_eq!(tx.balance_before, 2_000);
        assert_eq!(tx.balance_after, 500);

        let summary = ledger.credit_summary(1).unwrap();
        assert_eq!(summary.balance, 500);
        assert_eq!(summary.total_earned, 2_000);
        assert_eq!(summary.total_spent, 1_500);
    }

    #[test]
    fn test_duplicate_reference_is_a_no_op() {
        let ledger = LedgerStore::new();

        let first = ledger
            .credit(1, 1_000, TransactionKind::ReferralReward, 42, now())
            .unwrap();
        let second = ledger
            .credit(1, 1_000, TransactionKind::ReferralReward, 42, now())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.balance(1), 1_000);
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[test]
    fn test_same_reference_different_kind_both_apply() {
        let ledger = LedgerStore::new();

        ledger
            .credit(1, 1_000, TransactionKind::GiftCardRedeem, 5, now())
            .unwrap();
        ledger
            .credit(1, 200, TransactionKind::ReferralReward, 5, now())
            .unwrap();

        assert_eq!(ledger.balance(1), 1_200);
        assert_eq!(ledger.transactions(1).len(), 2);
    }

    #[test]
    fn test_retried_debit_returns_original_row() {
        let ledger = LedgerStore::new();
        ledger
            .credit(1, 2_000, TransactionKind::GiftCardRedeem, 10, now())
            .unwrap();

        let first = ledger
            .debit(1, 2_000, TransactionKind::PurchaseDebit, 77, now())
            .unwrap();
        // A retry after the balance dropped to zero must not fail.
        let second = ledger
            .debit(1, 2_000, TransactionKind::PurchaseDebit, 77, now())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.balance(1), 0);
    }

    #[test]
    fn test_reverse_may_go_negative() {
        let ledger = LedgerStore::new();
        ledger
            .credit(1, 500, TransactionKind::ReferralReward, 42, now())
            .unwrap();
        ledger
            .debit(1, 400, TransactionKind::PurchaseDebit, 77, now())
            .unwrap();

        let tx = ledger
            .reverse(1, 500, TransactionKind::ReferralRevoked, 42, now())
            .unwrap();

        assert_eq!(tx.balance_before, 100);
        assert_eq!(tx.balance_after, -400);
        assert_eq!(ledger.balance(1), -400);
        assert!(ledger.replay_consistent(1));
    }

    #[test]
    fn test_negative_balance_blocks_debit_but_not_credit() {
        let ledger = LedgerStore::new();
        ledger
            .credit(1, 500, TransactionKind::ReferralReward, 42, now())
            .unwrap();
        ledger
            .debit(1, 500, TransactionKind::PurchaseDebit, 77, now())
            .unwrap();
        ledger
            .reverse(1, 500, TransactionKind::ReferralRevoked, 42, now())
            .unwrap();
        assert_eq!(ledger.balance(1), -500);

        let debit = ledger.debit(1, 100, TransactionKind::PurchaseDebit, 78, now());
        assert!(matches!(
            debit.unwrap_err(),
            CreditError::InsufficientBalance { .. }
        ));

        // Fresh credit pays the debt down.
        ledger
            .credit(1, 800, TransactionKind::GiftCardRedeem, 11, now())
            .unwrap();
        assert_eq!(ledger.balance(1), 300);
    }

    #[test]
    fn test_replay_reconstructs_balance() {
        let ledger = LedgerStore::new();

        ledger
            .credit(1, 3_000, TransactionKind::GiftCardRedeem, 1, now())
            .unwrap();
        ledger
            .credit(1, 500, TransactionKind::ReferralReward, 2, now())
            .unwrap();
        ledger
            .debit(1, 1_200, TransactionKind::PurchaseDebit, 3, now())
            .unwrap();
        ledger
            .credit(1, 250, TransactionKind::RefundCredit, 3, now())
            .unwrap();

        assert_eq!(ledger.balance(1), 2_550);
        assert_eq!(ledger.replayed_balance(1), 2_550);
        assert!(ledger.replay_consistent(1));
    }

    #[test]
    fn test_concurrent_credits_serialize_without_lost_updates() {
        let ledger = Arc::new(LedgerStore::new());

        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    ledger
                        .credit(1, 100, TransactionKind::AdminAdjustment, i, Utc::now())
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.balance(1), 1_600);
        assert_eq!(ledger.transactions(1).len(), 16);
        assert!(ledger.replay_consistent(1));
    }

    #[test]
    fn test_concurrent_mixed_mutations_keep_chain_consistent() {
        let ledger = Arc::new(LedgerStore::new());
        ledger
            .credit(1, 10_000, TransactionKind::AdminAdjustment, 0, Utc::now())
            .unwrap();

        let handles: Vec<_> = (1..=8u64)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    ledger
                        .credit(1, 300, TransactionKind::RefundCredit, i, Utc::now())
                        .unwrap();
                    ledger
                        .debit(1, 200, TransactionKind::PurchaseDebit, i, Utc::now())
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.balance(1), 10_000 + 8 * 100);
        assert!(ledger.replay_consistent(1));
    }

    #[test]
    fn test_all_credit_summaries_sorted_by_user() {
        let ledger = LedgerStore::new();
        for user in [3u64, 1, 2] {
            ledger
                .credit(user, 100, TransactionKind::AdminAdjustment, user, now())
                .unwrap();
        }

        let users: Vec<UserId> = ledger
            .all_credit_summaries()
            .iter()
            .map(|row| row.user)
            .collect();
        assert_eq!(users, vec![1, 2, 3]);
    }
}

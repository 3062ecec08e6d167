//! Gift card vault
//!
//! Issues stored-value cards and redeems each exactly once. Issuance
//! routes the printable code through the [`CodeRegistry`] so it can never
//! be produced again; redemption flips the card's terminal flag and
//! credits the full value to the redeemer's ledger while the card's entry
//! lock is held, so concurrent attempts on one token resolve to a single
//! success.

use crate::core::code_registry::{CodeRegistry, MAX_GENERATION_ATTEMPTS};
use crate::core::ledger::LedgerStore;
use crate::types::{
    Amount, CreditError, GiftCard, GiftCardId, RecipientInfo, TransactionKind, UserId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Length of the unguessable token behind the card's QR image
const QR_TOKEN_LEN: usize = 32;

/// Issuance and one-time redemption of stored-value cards
///
/// Cards are kept forever, redeemed or not, deactivated or not; the vault
/// is an audit surface as much as a lookup table.
pub struct GiftCardVault {
    registry: Arc<CodeRegistry>,
    ledger: Arc<LedgerStore>,
    /// Cards keyed by QR token, the redemption key
    cards: DashMap<String, GiftCard>,
    /// Printable code -> QR token
    code_index: DashMap<String, String>,
    code_len: usize,
    next_id: AtomicU64,
}

impl GiftCardVault {
    /// Create an empty vault issuing codes of `code_len` characters
    pub fn new(registry: Arc<CodeRegistry>, ledger: Arc<LedgerStore>, code_len: usize) -> Self {
        GiftCardVault {
            registry,
            ledger,
            cards: DashMap::new(),
            code_index: DashMap::new(),
            code_len,
            next_id: AtomicU64::new(1),
        }
    }

    /// Issue a new card worth `amount` minor units
    ///
    /// Generates and registers the printable code, draws an unguessable QR
    /// token, and stores the card with `remaining_balance = amount`.
    ///
    /// # Errors
    ///
    /// * `Validation` if `amount` is not strictly positive
    /// * `CodeSpaceExhausted` if code or token generation ran out of
    ///   attempts
    pub fn issue(
        &self,
        amount: Amount,
        recipient: RecipientInfo,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<GiftCard, CreditError> {
        if amount <= 0 {
            return Err(CreditError::validation(
                "amount",
                format!("gift card value must be positive, got {amount}"),
            ));
        }
        if let Some(expiry) = expires_at {
            if expiry <= now {
                return Err(CreditError::validation(
                    "expires_at",
                    "expiry must be in the future",
                ));
            }
        }

        let id: GiftCardId = self.next_id.fetch_add(1, Ordering::Relaxed);
        let code = self.registry.issue_code(self.code_len, None)?;

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let qr_token = random_qr_token();
            let card = GiftCard {
                id,
                code: code.clone(),
                qr_token: qr_token.clone(),
                amount,
                remaining_balance: amount,
                is_redeemed: false,
                is_active: true,
                redeemed_by: None,
                redeemed_at: None,
                expires_at,
                recipient: recipient.clone(),
                issued_at: now,
            };

            let mut inserted = false;
            self.cards.entry(qr_token.clone()).or_insert_with(|| {
                inserted = true;
                card.clone()
            });
            if inserted {
                self.code_index.insert(code.clone(), qr_token);
                return Ok(card);
            }
        }
        Err(CreditError::CodeSpaceExhausted {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    /// Redeem the card behind `qr_token` for `user`
    ///
    /// Flips the terminal `is_redeemed` flag and credits the full face
    /// value as store credit, both while the card's entry lock is held.
    /// The ledger row's `(GiftCardRedeem, card id)` key makes the credit
    /// idempotent on top of the flag check.
    ///
    /// # Errors
    ///
    /// * `NotFound` if no card carries the token
    /// * `AlreadyUsed` on a second redemption attempt (idempotent from the
    ///   caller's perspective: same error on every retry, no state change)
    /// * `Inactive` if an admin deactivated the card
    /// * `Expired` if `now` is past `expires_at`
    pub fn redeem(
        &self,
        qr_token: &str,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Amount, CreditError> {
        let mut card = self
            .cards
            .get_mut(qr_token)
            .ok_or_else(|| CreditError::not_found("gift card", qr_token))?;

        if card.is_redeemed {
            return Err(CreditError::already_used("gift card", &card.code));
        }
        if !card.is_active {
            return Err(CreditError::inactive("gift card", &card.code));
        }
        if let Some(expiry) = card.expires_at {
            if now > expiry {
                return Err(CreditError::expired("gift card", &card.code));
            }
        }

        // Credit first: if the ledger rejects, the card stays redeemable.
        self.ledger
            .credit(user, card.amount, TransactionKind::GiftCardRedeem, card.id, now)?;

        card.is_redeemed = true;
        card.redeemed_by = Some(user);
        card.redeemed_at = Some(now);
        card.remaining_balance = 0;

        tracing::info!(card = card.id, user, amount = card.amount, "gift card redeemed");
        Ok(card.amount)
    }

    /// Snapshot a card by its printable code (the pricing read path)
    pub fn lookup(&self, code: &str) -> Option<GiftCard> {
        let token = self.code_index.get(code)?.value().clone();
        self.lookup_by_token(&token)
    }

    /// Snapshot a card by its QR token
    pub fn lookup_by_token(&self, qr_token: &str) -> Option<GiftCard> {
        self.cards.get(qr_token).map(|card| card.value().clone())
    }

    /// Admin kill switch: block redemption without deleting the card
    ///
    /// The card row and its registry entry survive, so the code stays
    /// burned forever.
    ///
    /// # Errors
    ///
    /// * `NotFound` if no card carries the code
    /// * `AlreadyUsed` if the card was already redeemed
    pub fn deactivate(&self, code: &str) -> Result<(), CreditError> {
        let token = self
            .code_index
            .get(code)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CreditError::not_found("gift card", code))?;
        let mut card = self
            .cards
            .get_mut(&token)
            .ok_or_else(|| CreditError::not_found("gift card", code))?;

        if card.is_redeemed {
            return Err(CreditError::already_used("gift card", code));
        }
        card.is_active = false;
        Ok(())
    }
}

/// Draw an unguessable token for the card's QR image
///
/// Full alphanumeric alphabet; unlike printable codes these are scanned,
/// never typed, so ambiguity does not matter but entropy does.
fn random_qr_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(QR_TOKEN_LEN)
        .map(char::from)
        .collect()
}

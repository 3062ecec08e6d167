//! Replay driver
//!
//! Runs a CSV file of operations through a fresh [`CheckoutEngine`] and
//! writes the resulting balance summaries as CSV. This is the offline
//! harness for support investigations and fixtures: feed it the recorded
//! operations, compare the balances.
//!
//! Codes and QR tokens are generated server-side, so replay files refer
//! to them indirectly: `gift_issue` rows name the card with a file-local
//! label that later `gift_redeem` rows reuse, and `register` rows name
//! the referring user by id. The driver keeps the label table.
//!
//! # Error Handling
//!
//! Fatal errors (file not found, output I/O) abort the run. Individual
//! operation errors are logged and skipped, mirroring how a production
//! handler would reject one request without taking down the service.

use crate::core::CheckoutEngine;
use crate::io::csv_format::{write_balances_csv, Operation};
use crate::io::reader::OperationReader;
use crate::types::{CreditError, RecipientInfo, TransactionKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Drives a [`CheckoutEngine`] from a replay file
pub struct Replayer {
    engine: CheckoutEngine,
    /// File-local gift card labels -> generated QR tokens
    gift_tokens: HashMap<String, String>,
}

impl Replayer {
    pub fn new(engine: CheckoutEngine) -> Self {
        Replayer {
            engine,
            gift_tokens: HashMap::new(),
        }
    }

    /// Stream operations from `input_path` and write final balances
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the run completed, even if some operations failed
    /// * `Err(String)` on a fatal input or output error
    pub fn run(&mut self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let reader = OperationReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(operation) => {
                    if let Err(error) = self.apply(&operation, Utc::now()) {
                        tracing::warn!(%error, ?operation, "operation rejected");
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "row skipped");
                }
            }
        }

        let summaries = self.engine.ledger().all_credit_summaries();
        write_balances_csv(&summaries, output)
    }

    /// Apply a single operation against the engine
    fn apply(&mut self, operation: &Operation, now: DateTime<Utc>) -> Result<(), CreditError> {
        match operation {
            Operation::Register { user, referrer, ip } => {
                let presented = match referrer {
                    Some(referrer) => Some(
                        self.engine
                            .referrals()
                            .code_of(*referrer)
                            .ok_or_else(|| {
                                CreditError::not_found("referral code", referrer.to_string())
                            })?
                            .code,
                    ),
                    None => None,
                };
                self.engine
                    .register_user(*user, presented.as_deref(), ip, now)?;
            }
            Operation::GiftIssue { label, amount } => {
                let card = self
                    .engine
                    .vault()
                    .issue(*amount, RecipientInfo::default(), None, now)?;
                self.gift_tokens.insert(label.clone(), card.qr_token);
            }
            Operation::GiftRedeem { user, label } => {
                let token = self
                    .gift_tokens
                    .get(label)
                    .ok_or_else(|| CreditError::not_found("gift card", label))?;
                self.engine.vault().redeem(token, *user, now)?;
            }
            Operation::Convert {
                user,
                order,
                subtotal,
            } => {
                let outcome = self.engine.referrals().convert(*user, *order, *subtotal, now)?;
                tracing::debug!(user, order, ?outcome, "conversion replayed");
            }
            Operation::Revoke { order } => {
                let outcome = self.engine.referrals().revoke(*order, "replayed refund", now)?;
                tracing::debug!(order, ?outcome, "revocation replayed");
            }
            Operation::Credit {
                user,
                amount,
                reference,
            } => {
                self.engine.admin_adjust(*user, *amount, *reference, now)?;
            }
            Operation::Debit {
                user,
                amount,
                reference,
            } => {
                self.engine.ledger().debit(
                    *user,
                    *amount,
                    TransactionKind::PurchaseDebit,
                    *reference,
                    now,
                )?;
            }
            Operation::Refund {
                user,
                amount,
                order,
            } => {
                self.engine.process_refund(*user, *order, *amount, "replayed refund", now)?;
            }
        }
        Ok(())
    }
}

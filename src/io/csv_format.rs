//! CSV format handling for replay operations and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - OperationRecord structure for deserialization
//! - Conversion from CSV records to typed operations
//! - Balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{Amount, OrderId, StoreCredit, UserId};
use serde::Deserialize;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: op, user, amount, code,
/// order, ip. Every column after `op` is optional because each operation
/// uses a different subset.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub op: String,
    pub user: Option<UserId>,
    pub amount: Option<Amount>,
    pub code: Option<String>,
    pub order: Option<OrderId>,
    pub ip: Option<String>,
}

/// A validated replay operation
///
/// Gift cards and referral codes are generated server-side, so replay
/// files cannot name them directly: `gift_issue`/`gift_redeem` rows carry
/// a file-local label in the `code` column, and `register` rows name the
/// referring user's id there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Register {
        user: UserId,
        referrer: Option<UserId>,
        ip: String,
    },
    GiftIssue {
        label: String,
        amount: Amount,
    },
    GiftRedeem {
        user: UserId,
        label: String,
    },
    Convert {
        user: UserId,
        order: OrderId,
        subtotal: Amount,
    },
    Revoke {
        order: OrderId,
    },
    Credit {
        user: UserId,
        amount: Amount,
        reference: u64,
    },
    Debit {
        user: UserId,
        amount: Amount,
        reference: u64,
    },
    Refund {
        user: UserId,
        amount: Amount,
        order: OrderId,
    },
}

fn require_user(record: &OperationRecord) -> Result<UserId, String> {
    record
        .user
        .ok_or_else(|| format!("{} requires a user", record.op))
}

fn require_amount(record: &OperationRecord) -> Result<Amount, String> {
    match record.amount {
        Some(amount) if amount > 0 => Ok(amount),
        Some(amount) => Err(format!(
            "{} requires a positive amount, got {}",
            record.op, amount
        )),
        None => Err(format!("{} requires an amount", record.op)),
    }
}

fn require_code(record: &OperationRecord) -> Result<String, String> {
    match &record.code {
        Some(code) if !code.trim().is_empty() => Ok(code.trim().to_string()),
        _ => Err(format!("{} requires a code label", record.op)),
    }
}

fn require_order(record: &OperationRecord) -> Result<OrderId, String> {
    record
        .order
        .ok_or_else(|| format!("{} requires an order", record.op))
}

/// Convert an OperationRecord to a typed Operation
///
/// Validates that each operation carries the columns it needs and that
/// amounts are positive. The `op` column is matched case-insensitively.
///
/// # Returns
///
/// Result containing either:
/// - Ok(Operation) - Successfully converted record
/// - Err(String) - Error message describing what was missing or malformed
pub fn convert_record(record: OperationRecord) -> Result<Operation, String> {
    match record.op.to_lowercase().as_str() {
        "register" => {
            let user = require_user(&record)?;
            let referrer = match &record.code {
                Some(code) if !code.trim().is_empty() => Some(
                    code.trim()
                        .parse::<UserId>()
                        .map_err(|_| format!("register referrer '{}' is not a user id", code))?,
                ),
                _ => None,
            };
            let ip = record.ip.clone().unwrap_or_else(|| "0.0.0.0".to_string());
            Ok(Operation::Register { user, referrer, ip })
        }
        "gift_issue" => Ok(Operation::GiftIssue {
            label: require_code(&record)?,
            amount: require_amount(&record)?,
        }),
        "gift_redeem" => Ok(Operation::GiftRedeem {
            user: require_user(&record)?,
            label: require_code(&record)?,
        }),
        "convert" => Ok(Operation::Convert {
            user: require_user(&record)?,
            order: require_order(&record)?,
            subtotal: require_amount(&record)?,
        }),
        "revoke" => Ok(Operation::Revoke {
            order: require_order(&record)?,
        }),
        "credit" => Ok(Operation::Credit {
            user: require_user(&record)?,
            amount: require_amount(&record)?,
            reference: require_order(&record)?,
        }),
        "debit" => Ok(Operation::Debit {
            user: require_user(&record)?,
            amount: require_amount(&record)?,
            reference: require_order(&record)?,
        }),
        "refund" => Ok(Operation::Refund {
            user: require_user(&record)?,
            amount: require_amount(&record)?,
            order: require_order(&record)?,
        }),
        other => Err(format!("Invalid operation: '{}'", other)),
    }
}

/// Write balance summaries to CSV format
///
/// Writes summaries with columns: user, balance, total_earned,
/// total_spent. Rows are sorted by user id for deterministic output.
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_balances_csv(
    summaries: &[StoreCredit],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["user", "balance", "total_earned", "total_spent"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = summaries.to_vec();
    sorted.sort_by_key(|summary| summary.user);

    for summary in sorted {
        writer
            .write_record(&[
                summary.user.to_string(),
                summary.balance.to_string(),
                summary.total_earned.to_string(),
                summary.total_spent.to_string(),
            ])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

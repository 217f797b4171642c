use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// ─── Transaction ────────────────────────────────────────────────────────────

/// A single inbound payment, as supplied by a transaction feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub memo: String,
    pub tx_hash: String,
}

/// Largest accepted payment amount (10^15). Any realistic feed summed at this
/// bound stays far inside `Decimal`'s range.
pub const MAX_TRANSACTION_AMOUNT: Decimal =
    Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

impl Transaction {
    /// Build a transaction, rejecting negative amounts and amounts above
    /// [`MAX_TRANSACTION_AMOUNT`].
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        amount: Decimal,
        timestamp: DateTime<Utc>,
        memo: impl Into<String>,
        tx_hash: impl Into<String>,
    ) -> AppResult<Self> {
        let id = id.into();
        if amount < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "transaction {id} has negative amount {amount}"
            )));
        }
        if amount > MAX_TRANSACTION_AMOUNT {
            return Err(AppError::Validation(format!(
                "transaction {id} amount {amount} exceeds {MAX_TRANSACTION_AMOUNT}"
            )));
        }
        Ok(Self {
            id,
            from: from.into(),
            to: to.into(),
            amount,
            timestamp,
            memo: memo.into(),
            tx_hash: tx_hash.into(),
        })
    }
}

// ─── PaymentFrequency ───────────────────────────────────────────────────────

/// How often payments recur, derived from payments per calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentFrequency {
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "bi-weekly")]
    BiWeekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "irregular")]
    Irregular,
}

impl PaymentFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentFrequency::Weekly => "weekly",
            PaymentFrequency::BiWeekly => "bi-weekly",
            PaymentFrequency::Monthly => "monthly",
            PaymentFrequency::Irregular => "irregular",
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentFrequency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(PaymentFrequency::Weekly),
            "bi-weekly" => Ok(PaymentFrequency::BiWeekly),
            "monthly" => Ok(PaymentFrequency::Monthly),
            "irregular" => Ok(PaymentFrequency::Irregular),
            other => Err(AppError::Decode(format!("unknown payment frequency `{other}`"))),
        }
    }
}

// ─── IncomeProfile ──────────────────────────────────────────────────────────

/// Income received in one calendar month (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyIncome {
    pub year: i32,
    pub month: u32,
    pub total: Decimal,
    pub payment_count: usize,
}

/// Snapshot of income metrics computed from a transaction set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeProfile {
    pub total_income: Decimal,
    pub average_monthly_income: Decimal,
    pub payment_count: usize,
    pub employer_count: u64,
    pub payment_frequency: PaymentFrequency,
    pub distinct_months: usize,
    /// Newest month first.
    pub monthly_breakdown: Vec<MonthlyIncome>,
    /// Newest first.
    pub transactions: Vec<Transaction>,
    pub last_updated: DateTime<Utc>,
}

// ─── ProofRecord ────────────────────────────────────────────────────────────

/// An issued, non-transferable attestation of a wallet's income profile.
///
/// Every field except `is_valid` is fixed at issuance. `verification_hash`
/// is a SHA-256 fingerprint over the other attested fields, see
/// [`crate::proof::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRecord {
    pub token_id: u64,
    pub wallet_address: String,
    pub verification_timestamp: DateTime<Utc>,
    pub average_monthly_income: Decimal,
    pub payment_frequency: PaymentFrequency,
    pub employer_count: u64,
    pub verification_hash: String,
    pub is_valid: bool,
    #[serde(rename = "tokenURI")]
    pub token_uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_amount_is_rejected() {
        let err = Transaction::new("tx-1", "0xa", "0xb", dec!(-1), Utc::now(), "", "0x01")
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_amount_is_accepted() {
        let tx = Transaction::new("tx-1", "0xa", "0xb", dec!(0), Utc::now(), "", "0x01").unwrap();
        assert!(tx.amount.is_zero());
    }

    #[test]
    fn amount_bound_is_inclusive() {
        assert_eq!(MAX_TRANSACTION_AMOUNT, Decimal::new(1_000_000_000_000_000, 0));
        assert!(
            Transaction::new("tx-1", "0xa", "0xb", MAX_TRANSACTION_AMOUNT, Utc::now(), "", "0x01")
                .is_ok()
        );
        let huge = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);
        let err = Transaction::new("tx-2", "0xa", "0xb", huge, Utc::now(), "", "0x02").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn frequency_labels_round_trip_through_str() {
        for f in [
            PaymentFrequency::Weekly,
            PaymentFrequency::BiWeekly,
            PaymentFrequency::Monthly,
            PaymentFrequency::Irregular,
        ] {
            assert_eq!(f.as_str().parse::<PaymentFrequency>().unwrap(), f);
        }
        assert!("fortnightly".parse::<PaymentFrequency>().is_err());
    }

    #[test]
    fn frequency_serializes_with_hyphenated_label() {
        let json = serde_json::to_string(&PaymentFrequency::BiWeekly).unwrap();
        assert_eq!(json, "\"bi-weekly\"");
    }
}

use chrono::{DateTime, Utc};
use neuraproof_core::{AppError, AppResult, ProofRecord, RevocationEvent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ─── Proof ──────────────────────────────────────────────────────────────────

/// Row of the `proofs` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProofRow {
    pub token_id: i64,
    pub wallet_address: String,
    pub verification_timestamp: DateTime<Utc>,
    pub average_monthly_income: Decimal,
    pub payment_frequency: String,
    pub employer_count: i64,
    pub verification_hash: String,
    pub is_valid: bool,
    pub token_uri: String,
}

impl ProofRow {
    pub fn from_record(record: &ProofRecord) -> AppResult<Self> {
        Ok(Self {
            token_id: to_i64(record.token_id, "token_id")?,
            wallet_address: record.wallet_address.clone(),
            verification_timestamp: record.verification_timestamp,
            average_monthly_income: record.average_monthly_income,
            payment_frequency: record.payment_frequency.as_str().to_string(),
            employer_count: to_i64(record.employer_count, "employer_count")?,
            verification_hash: record.verification_hash.to_ascii_lowercase(),
            is_valid: record.is_valid,
            token_uri: record.token_uri.clone(),
        })
    }

    pub fn into_record(self) -> AppResult<ProofRecord> {
        Ok(ProofRecord {
            token_id: to_u64(self.token_id, "token_id")?,
            wallet_address: self.wallet_address,
            verification_timestamp: self.verification_timestamp,
            average_monthly_income: self.average_monthly_income,
            payment_frequency: self.payment_frequency.parse()?,
            employer_count: to_u64(self.employer_count, "employer_count")?,
            verification_hash: self.verification_hash,
            is_valid: self.is_valid,
            token_uri: self.token_uri,
        })
    }
}

// ─── Revocation ─────────────────────────────────────────────────────────────

/// Row of the `proof_revocations` audit table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RevocationRow {
    pub id: i64,
    pub token_id: i64,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

impl RevocationRow {
    pub fn into_event(self) -> AppResult<RevocationEvent> {
        Ok(RevocationEvent {
            token_id: to_u64(self.token_id, "token_id")?,
            reason: self.reason,
            revoked_at: self.revoked_at,
        })
    }
}

pub(crate) fn to_i64(value: u64, field: &str) -> AppResult<i64> {
    i64::try_from(value).map_err(|_| AppError::Validation(format!("{field} {value} out of range")))
}

fn to_u64(value: i64, field: &str) -> AppResult<u64> {
    u64::try_from(value).map_err(|_| AppError::Decode(format!("{field} {value} is negative")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use neuraproof_core::{PaymentFrequency, ProofDraft, aggregate};
    use rust_decimal_macros::dec;

    fn record() -> ProofRecord {
        let mut profile = aggregate(&[]);
        profile.average_monthly_income = dec!(3120.40);
        profile.payment_frequency = PaymentFrequency::Weekly;
        profile.employer_count = 2;
        let at = Utc.with_ymd_and_hms(2025, 2, 14, 8, 0, 0).unwrap();
        ProofDraft::new(
            &profile,
            "0x742d35Cc6634C0532925a3b844Bc9e7595f1E123",
            at,
            "ipfs://QmNeuraProof",
        )
        .seal(12)
    }

    #[test]
    fn row_conversion_preserves_record() {
        let record = record();
        let row = ProofRow::from_record(&record).unwrap();
        assert_eq!(row.payment_frequency, "weekly");
        assert_eq!(row.token_id, 12);
        let back = row.into_record().unwrap();
        assert_eq!(back, record);
        assert!(back.is_untampered());
    }

    #[test]
    fn oversized_token_id_is_rejected() {
        let mut record = record();
        record.token_id = u64::MAX;
        assert!(ProofRow::from_record(&record).is_err());
    }

    #[test]
    fn corrupt_frequency_fails_to_load() {
        let mut row = ProofRow::from_record(&record()).unwrap();
        row.payment_frequency = "daily".into();
        assert!(matches!(row.into_record(), Err(AppError::Decode(_))));
    }
}

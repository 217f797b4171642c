//! Proof construction and the tamper-evident fingerprint.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::models::{IncomeProfile, PaymentFrequency, ProofRecord};

/// Domain separator mixed into every fingerprint.
const FINGERPRINT_DOMAIN: &[u8] = b"neuraproof/income-proof/v1";

/// Length of a rendered fingerprint: `0x` + 64 hex chars.
const FINGERPRINT_LEN: usize = 66;

/// SHA-256 fingerprint over the attested fields of a proof.
///
/// Fields are newline-delimited in a fixed order. The income is normalized so
/// `2500.50` and `2500.5` hash identically, and the timestamp is encoded as
/// unix microseconds.
pub fn fingerprint(
    token_id: u64,
    wallet_address: &str,
    average_monthly_income: Decimal,
    payment_frequency: PaymentFrequency,
    employer_count: u64,
    verification_timestamp: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_DOMAIN);
    for field in [
        token_id.to_string(),
        wallet_address.to_string(),
        average_monthly_income.normalize().to_string(),
        payment_frequency.as_str().to_string(),
        employer_count.to_string(),
        verification_timestamp.timestamp_micros().to_string(),
    ] {
        hasher.update(b"\n");
        hasher.update(field.as_bytes());
    }
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Whether `value` looks like a rendered fingerprint.
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_LEN
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

impl ProofRecord {
    /// Recompute the fingerprint from this record's attested fields.
    pub fn recompute_hash(&self) -> String {
        fingerprint(
            self.token_id,
            &self.wallet_address,
            self.average_monthly_income,
            self.payment_frequency,
            self.employer_count,
            self.verification_timestamp,
        )
    }

    /// True when the stored fingerprint matches the record's fields.
    pub fn is_untampered(&self) -> bool {
        self.recompute_hash().eq_ignore_ascii_case(&self.verification_hash)
    }
}

/// Everything a proof needs except its token id.
///
/// Registries turn a draft into a [`ProofRecord`] once an id is allocated,
/// so allocation and sealing happen under the same lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofDraft {
    pub wallet_address: String,
    pub verification_timestamp: DateTime<Utc>,
    pub average_monthly_income: Decimal,
    pub payment_frequency: PaymentFrequency,
    pub employer_count: u64,
    pub token_uri_base: String,
}

impl ProofDraft {
    /// Snapshot the attested metrics of `profile` for `wallet_address`.
    ///
    /// The timestamp is truncated to microseconds so it survives storage
    /// backends with microsecond precision unchanged.
    pub fn new(
        profile: &IncomeProfile,
        wallet_address: impl Into<String>,
        issued_at: DateTime<Utc>,
        token_uri_base: impl Into<String>,
    ) -> Self {
        let verification_timestamp =
            DateTime::from_timestamp_micros(issued_at.timestamp_micros()).unwrap_or(issued_at);
        Self {
            wallet_address: wallet_address.into(),
            verification_timestamp,
            average_monthly_income: profile.average_monthly_income,
            payment_frequency: profile.payment_frequency,
            employer_count: profile.employer_count,
            token_uri_base: token_uri_base.into(),
        }
    }

    /// Assign `token_id` and derive the fingerprint.
    pub fn seal(self, token_id: u64) -> ProofRecord {
        let verification_hash = fingerprint(
            token_id,
            &self.wallet_address,
            self.average_monthly_income,
            self.payment_frequency,
            self.employer_count,
            self.verification_timestamp,
        );
        ProofRecord {
            token_id,
            token_uri: format!("{}{}", self.token_uri_base, token_id),
            wallet_address: self.wallet_address,
            verification_timestamp: self.verification_timestamp,
            average_monthly_income: self.average_monthly_income,
            payment_frequency: self.payment_frequency,
            employer_count: self.employer_count,
            verification_hash,
            is_valid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::income::aggregate;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const WALLET: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f1E123";

    fn draft() -> ProofDraft {
        let mut profile = aggregate(&[]);
        profile.average_monthly_income = dec!(4200.50);
        profile.payment_frequency = PaymentFrequency::BiWeekly;
        profile.employer_count = 3;
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, 30, 0).unwrap();
        ProofDraft::new(&profile, WALLET, at, "ipfs://QmNeuraProof")
    }

    #[test]
    fn sealed_record_carries_profile_snapshot() {
        let record = draft().seal(7);
        assert_eq!(record.token_id, 7);
        assert_eq!(record.wallet_address, WALLET);
        assert_eq!(record.average_monthly_income, dec!(4200.50));
        assert_eq!(record.payment_frequency, PaymentFrequency::BiWeekly);
        assert_eq!(record.employer_count, 3);
        assert_eq!(record.token_uri, "ipfs://QmNeuraProof7");
        assert!(record.is_valid);
    }

    #[test]
    fn fingerprint_is_deterministic_and_well_formed() {
        let a = draft().seal(1);
        let b = draft().seal(1);
        assert_eq!(a.verification_hash, b.verification_hash);
        assert!(is_fingerprint(&a.verification_hash));
        assert!(a.is_untampered());
    }

    #[test]
    fn fingerprint_depends_on_every_field() {
        let base = draft().seal(1);
        let mut changed = base.clone();
        changed.employer_count = 4;
        assert!(!changed.is_untampered());

        let mut changed = base.clone();
        changed.average_monthly_income = dec!(9999);
        assert!(!changed.is_untampered());

        let mut changed = base.clone();
        changed.wallet_address = "0x0000000000000000000000000000000000000001".into();
        assert!(!changed.is_untampered());

        let mut changed = base.clone();
        changed.verification_timestamp += chrono::Duration::microseconds(1);
        assert!(!changed.is_untampered());

        assert_ne!(draft().seal(2).verification_hash, base.verification_hash);
    }

    #[test]
    fn income_scale_does_not_change_fingerprint() {
        let mut a = draft();
        a.average_monthly_income = dec!(2500.5);
        let mut b = draft();
        b.average_monthly_income = dec!(2500.500);
        assert_eq!(a.seal(1).verification_hash, b.seal(1).verification_hash);
    }

    #[test]
    fn validity_flag_is_not_attested() {
        let mut record = draft().seal(1);
        record.is_valid = false;
        assert!(record.is_untampered());
    }

    #[test]
    fn timestamp_truncated_to_micros() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let d = ProofDraft::new(&aggregate(&[]), WALLET, at, "");
        assert_eq!(d.verification_timestamp.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn is_fingerprint_rejects_garbage() {
        assert!(!is_fingerprint("0x1234"));
        assert!(!is_fingerprint(&format!("0x{}", "g".repeat(64))));
        assert!(!is_fingerprint(&"a".repeat(66)));
    }
}

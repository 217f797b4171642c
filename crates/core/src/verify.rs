use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::ProofRecord;
use crate::proof::is_fingerprint;
use crate::registry::ProofRegistry;

/// What a verification query's value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
    TokenId,
    Hash,
    Wallet,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::TokenId => "tokenId",
            QueryKind::Hash => "hash",
            QueryKind::Wallet => "wallet",
        })
    }
}

impl FromStr for QueryKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tokenid" | "token_id" | "token-id" | "id" => Ok(QueryKind::TokenId),
            "hash" | "fingerprint" => Ok(QueryKind::Hash),
            "wallet" | "address" => Ok(QueryKind::Wallet),
            other => Err(AppError::Validation(format!("unknown query kind `{other}`"))),
        }
    }
}

/// Outcome of a verification query.
///
/// `found` says whether a proof exists at all; `valid` additionally requires
/// that it has not been revoked and that its fingerprint still matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub found: bool,
    pub valid: bool,
    pub record: Option<ProofRecord>,
}

impl VerificationResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            valid: false,
            record: None,
        }
    }

    pub fn from_record(record: ProofRecord) -> Self {
        let untampered = record.is_untampered();
        if !untampered {
            tracing::error!(
                token_id = record.token_id,
                stored = %record.verification_hash,
                "Stored fingerprint does not match record"
            );
        }
        Self {
            found: true,
            valid: record.is_valid && untampered,
            record: Some(record),
        }
    }
}

/// Parse a token id query. Anything but a positive integer is `None`.
pub fn parse_token_id(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_prefix('#').unwrap_or(value);
    value.parse::<u64>().ok().filter(|id| *id > 0)
}

/// Read-only resolver from verification queries to proofs.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<dyn ProofRegistry>,
}

impl Resolver {
    pub fn new(registry: Arc<dyn ProofRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve a single query. Malformed values resolve to not-found; only
    /// storage failures are errors.
    pub async fn verify(&self, kind: QueryKind, value: &str) -> AppResult<VerificationResult> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(VerificationResult::not_found());
        }

        let record = match kind {
            QueryKind::TokenId => match parse_token_id(value) {
                Some(id) => self.registry.get_by_id(id).await?,
                None => {
                    tracing::debug!(value = %value, "Unparseable token id");
                    None
                }
            },
            QueryKind::Hash if is_fingerprint(value) => self.registry.get_by_hash(value).await?,
            QueryKind::Hash => {
                tracing::debug!(value = %value, "Malformed fingerprint");
                None
            }
            QueryKind::Wallet => self.registry.latest_by_wallet(value).await?,
        };

        let result = record
            .map(VerificationResult::from_record)
            .unwrap_or_else(VerificationResult::not_found);
        tracing::info!(
            kind = %kind,
            found = result.found,
            valid = result.valid,
            "Verification query resolved"
        );
        Ok(result)
    }

    /// Every proof issued to `wallet`, oldest first, each with its verdict.
    pub async fn verify_wallet_history(&self, wallet: &str) -> AppResult<Vec<VerificationResult>> {
        Ok(self
            .registry
            .get_by_wallet(wallet)
            .await?
            .into_iter()
            .map(VerificationResult::from_record)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::income::aggregate;
    use crate::proof::ProofDraft;
    use crate::registry::MemoryRegistry;
    use chrono::{TimeZone, Utc};

    const WALLET: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f1E123";

    async fn seeded() -> (Arc<MemoryRegistry>, ProofRecord) {
        let registry = Arc::new(MemoryRegistry::new());
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        let record = registry
            .append_next(ProofDraft::new(&aggregate(&[]), WALLET, at, "ipfs://x/"))
            .await
            .unwrap();
        (registry, record)
    }

    #[test]
    fn token_id_parsing() {
        assert_eq!(parse_token_id("42"), Some(42));
        assert_eq!(parse_token_id(" #7 "), Some(7));
        assert_eq!(parse_token_id("0"), None);
        assert_eq!(parse_token_id("-3"), None);
        assert_eq!(parse_token_id("4x2"), None);
        assert_eq!(parse_token_id("99999999999999999999999"), None);
    }

    #[test]
    fn query_kind_parsing() {
        assert_eq!("tokenId".parse::<QueryKind>().unwrap(), QueryKind::TokenId);
        assert_eq!("HASH".parse::<QueryKind>().unwrap(), QueryKind::Hash);
        assert_eq!("address".parse::<QueryKind>().unwrap(), QueryKind::Wallet);
        assert!("ens".parse::<QueryKind>().is_err());
    }

    #[tokio::test]
    async fn resolves_each_query_kind() {
        let (registry, record) = seeded().await;
        let resolver = Resolver::new(registry);

        for (kind, value) in [
            (QueryKind::TokenId, record.token_id.to_string()),
            (QueryKind::Hash, record.verification_hash.clone()),
            (QueryKind::Wallet, WALLET.to_lowercase()),
        ] {
            let result = resolver.verify(kind, &value).await.unwrap();
            assert!(result.found, "{kind} lookup");
            assert!(result.valid);
            assert_eq!(result.record.as_ref(), Some(&record));
        }
    }

    #[tokio::test]
    async fn garbage_resolves_to_not_found() {
        let (registry, _) = seeded().await;
        let resolver = Resolver::new(registry);
        for (kind, value) in [
            (QueryKind::TokenId, "abc"),
            (QueryKind::TokenId, "999"),
            (QueryKind::TokenId, ""),
            (QueryKind::Hash, "0xdeadbeef"),
            (QueryKind::Wallet, "   "),
        ] {
            assert_eq!(
                resolver.verify(kind, value).await.unwrap(),
                VerificationResult::not_found()
            );
        }
    }

    #[tokio::test]
    async fn hash_lookup_checks_shape_then_ignores_case() {
        let (registry, record) = seeded().await;
        let resolver = Resolver::new(registry);

        let upper = format!("0x{}", record.verification_hash[2..].to_uppercase());
        let result = resolver.verify(QueryKind::Hash, &format!(" {upper} ")).await.unwrap();
        assert_eq!(result.record, Some(record.clone()));

        let truncated = &record.verification_hash[..40];
        let result = resolver.verify(QueryKind::Hash, truncated).await.unwrap();
        assert!(!result.found);
    }

    #[tokio::test]
    async fn revoked_proof_is_found_but_invalid() {
        let (registry, record) = seeded().await;
        registry.revoke(record.token_id, "disputed").await.unwrap();
        let result = Resolver::new(registry)
            .verify(QueryKind::TokenId, "1")
            .await
            .unwrap();
        assert!(result.found);
        assert!(!result.valid);
        assert!(!result.record.unwrap().is_valid);
    }

    #[tokio::test]
    async fn tampered_record_is_found_but_invalid() {
        let (_, mut record) = seeded().await;
        record.employer_count += 1;
        let registry = Arc::new(MemoryRegistry::from_records(vec![record]).unwrap());
        let result = Resolver::new(registry)
            .verify(QueryKind::TokenId, "1")
            .await
            .unwrap();
        assert!(result.found);
        assert!(!result.valid);
    }

    #[tokio::test]
    async fn wallet_history_lists_all_proofs() {
        let (registry, _) = seeded().await;
        registry
            .append_next(ProofDraft::new(&aggregate(&[]), WALLET, Utc::now(), ""))
            .await
            .unwrap();
        let history = Resolver::new(registry)
            .verify_wallet_history(WALLET)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.found && r.valid));
    }
}

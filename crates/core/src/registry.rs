//! Append-only proof registry.
//!
//! Records are keyed by token id, with derived indexes on fingerprint and
//! wallet. Allocation of the next id and the append must happen under one
//! writer; [`ProofRegistry::append_next`] is the entry point that guarantees it.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::ProofRecord;
use crate::proof::ProofDraft;

/// Audit entry written when a proof is revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationEvent {
    pub token_id: u64,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

#[async_trait]
pub trait ProofRegistry: Send + Sync {
    /// Smallest unused id, strictly greater than every id ever issued.
    async fn next_token_id(&self) -> AppResult<u64>;

    /// Append a sealed record. Fails with `DuplicateTokenId` unless the id is
    /// greater than every id already issued.
    async fn append(&self, record: ProofRecord) -> AppResult<()>;

    /// Allocate the next id, seal `draft` with it and append, atomically.
    async fn append_next(&self, draft: ProofDraft) -> AppResult<ProofRecord>;

    async fn get_by_id(&self, token_id: u64) -> AppResult<Option<ProofRecord>>;

    async fn get_by_hash(&self, hash: &str) -> AppResult<Option<ProofRecord>>;

    /// Every proof issued to `wallet`, oldest first.
    async fn get_by_wallet(&self, wallet: &str) -> AppResult<Vec<ProofRecord>>;

    /// Flip `is_valid` to false and record an audit event. Revoking an
    /// already revoked proof changes nothing.
    async fn revoke(&self, token_id: u64, reason: &str) -> AppResult<ProofRecord>;

    async fn len(&self) -> AppResult<u64>;

    /// Most recently issued proof for `wallet`.
    async fn latest_by_wallet(&self, wallet: &str) -> AppResult<Option<ProofRecord>> {
        Ok(self.get_by_wallet(wallet).await?.pop())
    }
}

fn wallet_key(wallet: &str) -> String {
    wallet.trim().to_ascii_lowercase()
}

fn hash_key(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

#[derive(Debug, Default)]
struct Index {
    records: BTreeMap<u64, ProofRecord>,
    by_hash: HashMap<String, u64>,
    by_wallet: HashMap<String, Vec<u64>>,
    high_water: u64,
    revocations: Vec<RevocationEvent>,
}

impl Index {
    /// Append a freshly issued record. Ids must be strictly increasing, so an
    /// id at or below the high-water mark is refused even if unused.
    fn append(&mut self, record: ProofRecord) -> AppResult<()> {
        if record.token_id != 0 && record.token_id <= self.high_water {
            return Err(AppError::DuplicateTokenId(record.token_id));
        }
        self.insert(record)
    }

    /// Insert in any order. Used when rebuilding from stored records.
    fn insert(&mut self, record: ProofRecord) -> AppResult<()> {
        if record.token_id == 0 {
            return Err(AppError::Validation("token id must be positive".into()));
        }
        if self.records.contains_key(&record.token_id) {
            return Err(AppError::DuplicateTokenId(record.token_id));
        }
        let hash = hash_key(&record.verification_hash);
        if let Some(existing) = self.by_hash.get(&hash) {
            return Err(AppError::Validation(format!(
                "fingerprint {hash} already registered to token {existing}"
            )));
        }

        self.by_hash.insert(hash, record.token_id);
        self.by_wallet
            .entry(wallet_key(&record.wallet_address))
            .or_default()
            .push(record.token_id);
        self.high_water = self.high_water.max(record.token_id);
        self.records.insert(record.token_id, record);
        Ok(())
    }
}

/// In-process registry for tests and for embedding the engine without a
/// database.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    inner: RwLock<Index>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry (including derived indexes) from primary records.
    pub fn from_records(records: impl IntoIterator<Item = ProofRecord>) -> AppResult<Self> {
        let mut index = Index::default();
        for record in records {
            index.insert(record)?;
        }
        Ok(Self {
            inner: RwLock::new(index),
        })
    }

    /// Revocation audit trail, in the order events happened.
    pub async fn revocations(&self) -> Vec<RevocationEvent> {
        self.inner.read().await.revocations.clone()
    }
}

#[async_trait]
impl ProofRegistry for MemoryRegistry {
    async fn next_token_id(&self) -> AppResult<u64> {
        Ok(self.inner.read().await.high_water + 1)
    }

    async fn append(&self, record: ProofRecord) -> AppResult<()> {
        self.inner.write().await.append(record)
    }

    async fn append_next(&self, draft: ProofDraft) -> AppResult<ProofRecord> {
        let mut index = self.inner.write().await;
        let record = draft.seal(index.high_water + 1);
        index.append(record.clone())?;
        Ok(record)
    }

    async fn get_by_id(&self, token_id: u64) -> AppResult<Option<ProofRecord>> {
        Ok(self.inner.read().await.records.get(&token_id).cloned())
    }

    async fn get_by_hash(&self, hash: &str) -> AppResult<Option<ProofRecord>> {
        let index = self.inner.read().await;
        Ok(index
            .by_hash
            .get(&hash_key(hash))
            .and_then(|id| index.records.get(id))
            .cloned())
    }

    async fn get_by_wallet(&self, wallet: &str) -> AppResult<Vec<ProofRecord>> {
        let index = self.inner.read().await;
        let mut records: Vec<ProofRecord> = index
            .by_wallet
            .get(&wallet_key(wallet))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| index.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| {
            a.verification_timestamp
                .cmp(&b.verification_timestamp)
                .then(a.token_id.cmp(&b.token_id))
        });
        Ok(records)
    }

    async fn revoke(&self, token_id: u64, reason: &str) -> AppResult<ProofRecord> {
        let mut index = self.inner.write().await;
        let record = index
            .records
            .get_mut(&token_id)
            .ok_or_else(|| AppError::NotFound(format!("proof #{token_id}")))?;

        if !record.is_valid {
            return Ok(record.clone());
        }
        record.is_valid = false;
        let revoked = record.clone();

        index.revocations.push(RevocationEvent {
            token_id,
            reason: reason.to_string(),
            revoked_at: Utc::now(),
        });
        tracing::warn!(token_id = token_id, reason = %reason, "Proof revoked");
        Ok(revoked)
    }

    async fn len(&self) -> AppResult<u64> {
        Ok(self.inner.read().await.records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::income::aggregate;
    use chrono::TimeZone;
    use std::sync::Arc;

    const ALICE: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f1E123";
    const BOB: &str = "0x8626f6940E2eb28930eFb4CeF49B2d1F2C9C1199";

    fn draft(wallet: &str, minute: u32) -> ProofDraft {
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, minute, 0).unwrap();
        ProofDraft::new(&aggregate(&[]), wallet, at, "ipfs://QmNeuraProof")
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let registry = MemoryRegistry::new();
        assert_eq!(registry.next_token_id().await.unwrap(), 1);
        let a = registry.append_next(draft(ALICE, 0)).await.unwrap();
        let b = registry.append_next(draft(ALICE, 1)).await.unwrap();
        assert_eq!((a.token_id, b.token_id), (1, 2));
        assert_eq!(registry.next_token_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let registry = MemoryRegistry::new();
        registry.append(draft(ALICE, 0).seal(5)).await.unwrap();
        let err = registry.append(draft(BOB, 1).seal(5)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateTokenId(5)));
        assert_eq!(registry.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lower_unused_id_is_rejected() {
        let registry = MemoryRegistry::new();
        registry.append(draft(ALICE, 0).seal(10)).await.unwrap();
        let err = registry.append(draft(BOB, 1).seal(3)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateTokenId(3)));
        assert_eq!(registry.len().await.unwrap(), 1);
        assert_eq!(registry.get_by_id(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn next_id_skips_past_externally_chosen_ids() {
        let registry = MemoryRegistry::new();
        registry.append(draft(ALICE, 0).seal(10)).await.unwrap();
        assert_eq!(registry.next_token_id().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn lookups_by_hash_and_wallet() {
        let registry = MemoryRegistry::new();
        let a = registry.append_next(draft(ALICE, 2)).await.unwrap();
        let b = registry.append_next(draft(BOB, 1)).await.unwrap();
        let c = registry.append_next(draft(ALICE, 0)).await.unwrap();

        let found = registry
            .get_by_hash(&a.verification_hash.to_uppercase().replace("0X", "0x"))
            .await
            .unwrap();
        assert_eq!(found, Some(a.clone()));
        assert_eq!(registry.get_by_hash("0xnope").await.unwrap(), None);

        let alice = registry.get_by_wallet(&ALICE.to_lowercase()).await.unwrap();
        let ids: Vec<u64> = alice.iter().map(|r| r.token_id).collect();
        // oldest timestamp first, regardless of id order
        assert_eq!(ids, vec![c.token_id, a.token_id]);

        let latest = registry.latest_by_wallet(ALICE).await.unwrap().unwrap();
        assert_eq!(latest.token_id, a.token_id);
        assert_eq!(registry.get_by_wallet(BOB).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn revocation_flips_only_validity_and_is_audited_once() {
        let registry = MemoryRegistry::new();
        let issued = registry.append_next(draft(ALICE, 0)).await.unwrap();

        let revoked = registry.revoke(issued.token_id, "fraud report").await.unwrap();
        assert!(!revoked.is_valid);
        assert_eq!(revoked.verification_hash, issued.verification_hash);
        assert!(revoked.is_untampered());

        registry.revoke(issued.token_id, "again").await.unwrap();
        let events = registry.revocations().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, "fraud report");

        assert!(matches!(
            registry.revoke(99, "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn indexes_rebuild_from_primary_records() {
        let original = MemoryRegistry::new();
        let a = original.append_next(draft(ALICE, 0)).await.unwrap();
        let b = original.append_next(draft(ALICE, 1)).await.unwrap();

        let rebuilt = MemoryRegistry::from_records(vec![b.clone(), a.clone()]).unwrap();
        assert_eq!(rebuilt.get_by_hash(&b.verification_hash).await.unwrap(), Some(b));
        assert_eq!(rebuilt.get_by_wallet(ALICE).await.unwrap().len(), 2);
        assert_eq!(rebuilt.next_token_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn concurrent_issuance_never_shares_an_id() {
        let registry = Arc::new(MemoryRegistry::new());
        let mut handles = Vec::new();
        for i in 0..32u32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.append_next(draft(ALICE, i % 60)).await.unwrap().token_id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=32).collect::<Vec<u64>>());
    }
}

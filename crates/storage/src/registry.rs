use async_trait::async_trait;
use neuraproof_core::{
    AppError, AppResult, ProofDraft, ProofRecord, ProofRegistry, RevocationEvent,
};
use sqlx::PgPool;

use crate::models::{ProofRow, to_i64};
use crate::repos;

/// Postgres-backed proof registry.
///
/// Id allocation and insertion run in one transaction holding an advisory
/// lock, so concurrent issuers (in this or other processes) never collide.
#[derive(Clone)]
pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Revocation audit trail for a proof.
    pub async fn revocations(&self, token_id: u64) -> AppResult<Vec<RevocationEvent>> {
        repos::get_revocations(&self.pool, to_i64(token_id, "token_id")?)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|row| row.into_event())
            .collect()
    }

    async fn insert_locked(&self, record: &ProofRecord) -> AppResult<()> {
        let row = ProofRow::from_record(record)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        repos::lock_issuance(&mut *tx).await.map_err(db_err)?;

        let max = repos::get_max_token_id(&mut *tx).await.map_err(db_err)?;
        if max.is_some_and(|max| row.token_id <= max) {
            return Err(AppError::DuplicateTokenId(record.token_id));
        }
        repos::insert_proof(&mut *tx, &row)
            .await
            .map_err(|e| insert_err(e, record.token_id))?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

fn insert_err(e: sqlx::Error, token_id: u64) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            if db.constraint() == Some("proofs_verification_hash_key") {
                return AppError::Validation(format!(
                    "fingerprint already registered (token {token_id})"
                ));
            }
            return AppError::DuplicateTokenId(token_id);
        }
    }
    db_err(e)
}

fn into_records(rows: Vec<ProofRow>) -> AppResult<Vec<ProofRecord>> {
    rows.into_iter().map(ProofRow::into_record).collect()
}

#[async_trait]
impl ProofRegistry for PgRegistry {
    async fn next_token_id(&self) -> AppResult<u64> {
        let max = repos::get_max_token_id(&self.pool).await.map_err(db_err)?;
        Ok(max.unwrap_or(0).max(0) as u64 + 1)
    }

    async fn append(&self, record: ProofRecord) -> AppResult<()> {
        self.insert_locked(&record).await
    }

    async fn append_next(&self, draft: ProofDraft) -> AppResult<ProofRecord> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        repos::lock_issuance(&mut *tx).await.map_err(db_err)?;

        let next = repos::get_max_token_id(&mut *tx)
            .await
            .map_err(db_err)?
            .unwrap_or(0)
            .max(0) as u64
            + 1;
        let record = draft.seal(next);
        let row = ProofRow::from_record(&record)?;
        repos::insert_proof(&mut *tx, &row)
            .await
            .map_err(|e| insert_err(e, next))?;

        tx.commit().await.map_err(db_err)?;
        Ok(record)
    }

    async fn get_by_id(&self, token_id: u64) -> AppResult<Option<ProofRecord>> {
        let Ok(id) = i64::try_from(token_id) else {
            return Ok(None);
        };
        repos::get_proof(&self.pool, id)
            .await
            .map_err(db_err)?
            .map(ProofRow::into_record)
            .transpose()
    }

    async fn get_by_hash(&self, hash: &str) -> AppResult<Option<ProofRecord>> {
        repos::get_proof_by_hash(&self.pool, hash.trim())
            .await
            .map_err(db_err)?
            .map(ProofRow::into_record)
            .transpose()
    }

    async fn get_by_wallet(&self, wallet: &str) -> AppResult<Vec<ProofRecord>> {
        let rows = repos::get_wallet_proofs(&self.pool, wallet.trim())
            .await
            .map_err(db_err)?;
        into_records(rows)
    }

    async fn revoke(&self, token_id: u64, reason: &str) -> AppResult<ProofRecord> {
        let id = to_i64(token_id, "token_id")?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let changed = repos::mark_revoked(&mut *tx, id).await.map_err(db_err)?;
        if changed == 1 {
            repos::insert_revocation(&mut *tx, id, reason)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        let record = self
            .get_by_id(token_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("proof #{token_id}")))?;
        if changed == 1 {
            tracing::warn!(token_id = token_id, reason = %reason, "Proof revoked");
        }
        Ok(record)
    }

    async fn len(&self) -> AppResult<u64> {
        let count = repos::get_proof_count(&self.pool).await.map_err(db_err)?;
        Ok(count.max(0) as u64)
    }
}

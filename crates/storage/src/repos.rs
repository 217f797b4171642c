use sqlx::{Executor, PgPool, Postgres};

use crate::models::*;

/// Advisory lock key serializing id allocation across connections.
const ISSUANCE_LOCK_KEY: i64 = 0x4e50_0001;

// ─── Proof Writes ───────────────────────────────────────────────────────────

/// Insert a proof. Conflicts on `token_id` or `verification_hash` are
/// surfaced as unique violations; nothing is ever overwritten.
pub async fn insert_proof<'e, E>(executor: E, proof: &ProofRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO proofs (token_id, wallet_address, verification_timestamp, average_monthly_income,
                            payment_frequency, employer_count, verification_hash, is_valid, token_uri)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(proof.token_id)
    .bind(&proof.wallet_address)
    .bind(proof.verification_timestamp)
    .bind(proof.average_monthly_income)
    .bind(&proof.payment_frequency)
    .bind(proof.employer_count)
    .bind(&proof.verification_hash)
    .bind(proof.is_valid)
    .bind(&proof.token_uri)
    .execute(executor)
    .await?;
    Ok(())
}

/// Take the transaction-scoped issuance lock. Released on commit/rollback.
pub async fn lock_issuance<'e, E>(executor: E) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ISSUANCE_LOCK_KEY)
        .execute(executor)
        .await?;
    Ok(())
}

/// Highest token id ever issued (proofs are never deleted).
pub async fn get_max_token_id<'e, E>(executor: E) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(token_id) FROM proofs")
        .fetch_one(executor)
        .await?;
    Ok(row.0)
}

// ─── Proof Queries ──────────────────────────────────────────────────────────

/// Get a single proof by token id.
pub async fn get_proof(pool: &PgPool, token_id: i64) -> Result<Option<ProofRow>, sqlx::Error> {
    sqlx::query_as::<_, ProofRow>("SELECT * FROM proofs WHERE token_id = $1")
        .bind(token_id)
        .fetch_optional(pool)
        .await
}

/// Get a single proof by fingerprint (stored lower-case).
pub async fn get_proof_by_hash(pool: &PgPool, hash: &str) -> Result<Option<ProofRow>, sqlx::Error> {
    sqlx::query_as::<_, ProofRow>("SELECT * FROM proofs WHERE verification_hash = LOWER($1)")
        .bind(hash)
        .fetch_optional(pool)
        .await
}

/// All proofs of a wallet, oldest first.
pub async fn get_wallet_proofs(pool: &PgPool, wallet: &str) -> Result<Vec<ProofRow>, sqlx::Error> {
    sqlx::query_as::<_, ProofRow>(
        r#"
        SELECT * FROM proofs
        WHERE LOWER(wallet_address) = LOWER($1)
        ORDER BY verification_timestamp ASC, token_id ASC
        "#,
    )
    .bind(wallet)
    .fetch_all(pool)
    .await
}

/// Get the count of issued proofs.
pub async fn get_proof_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM proofs")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

// ─── Revocation ─────────────────────────────────────────────────────────────

/// Clear `is_valid` on a still-valid proof. Returns the number of rows changed.
pub async fn mark_revoked<'e, E>(executor: E, token_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("UPDATE proofs SET is_valid = FALSE WHERE token_id = $1 AND is_valid")
        .bind(token_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Append a revocation audit entry.
pub async fn insert_revocation<'e, E>(
    executor: E,
    token_id: i64,
    reason: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("INSERT INTO proof_revocations (token_id, reason) VALUES ($1, $2)")
        .bind(token_id)
        .bind(reason)
        .execute(executor)
        .await?;
    Ok(())
}

/// Revocation history for a proof, oldest first.
pub async fn get_revocations(
    pool: &PgPool,
    token_id: i64,
) -> Result<Vec<RevocationRow>, sqlx::Error> {
    sqlx::query_as::<_, RevocationRow>(
        "SELECT * FROM proof_revocations WHERE token_id = $1 ORDER BY id ASC",
    )
    .bind(token_id)
    .fetch_all(pool)
    .await
}

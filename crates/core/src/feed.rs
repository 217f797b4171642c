use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::models::Transaction;

/// Source of inbound payments for a wallet.
#[async_trait]
pub trait TransactionFeed: Send + Sync {
    /// Fetch every payment received by `wallet`. Fails with
    /// `FeedUnavailable` when the backing source cannot be reached.
    async fn fetch(&self, wallet: &str) -> AppResult<Vec<Transaction>>;
}

/// Timeout and retry policy applied around a feed fetch.
#[derive(Debug, Clone)]
pub struct FeedPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Extra attempts after the first.
    pub retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Fetch through `feed`, retrying transient failures per `policy`.
///
/// Only `FeedUnavailable` and timeouts are retried; anything else is
/// returned immediately. Exhausted retries surface as `FeedUnavailable`.
pub async fn fetch_with_policy(
    feed: &dyn TransactionFeed,
    wallet: &str,
    policy: &FeedPolicy,
) -> AppResult<Vec<Transaction>> {
    let attempts = policy.retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, feed.fetch(wallet)).await {
            Ok(Ok(transactions)) => {
                tracing::info!(
                    wallet = %wallet,
                    count = transactions.len(),
                    attempt = attempt,
                    "Fetched transactions"
                );
                return Ok(transactions);
            }
            Ok(Err(e @ AppError::FeedUnavailable(_))) => {
                tracing::warn!(wallet = %wallet, attempt = attempt, error = %e, "Feed fetch failed");
                last_error = e.to_string();
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::warn!(
                    wallet = %wallet,
                    attempt = attempt,
                    timeout_ms = policy.timeout.as_millis() as u64,
                    "Feed fetch timed out"
                );
                last_error = format!("timed out after {:?}", policy.timeout);
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.backoff * attempt).await;
        }
    }

    Err(AppError::FeedUnavailable(format!(
        "{attempts} attempt(s) failed for {wallet}: {last_error}"
    )))
}

/// Feed backed by transactions already in memory, e.g. loaded from a JSON
/// export. Wallet matching on `to` is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    by_wallet: HashMap<String, Vec<Transaction>>,
}

impl MemoryFeed {
    pub fn new(transactions: impl IntoIterator<Item = Transaction>) -> Self {
        let mut by_wallet: HashMap<String, Vec<Transaction>> = HashMap::new();
        for tx in transactions {
            by_wallet
                .entry(tx.to.to_ascii_lowercase())
                .or_default()
                .push(tx);
        }
        Self { by_wallet }
    }
}

#[async_trait]
impl TransactionFeed for MemoryFeed {
    async fn fetch(&self, wallet: &str) -> AppResult<Vec<Transaction>> {
        Ok(self
            .by_wallet
            .get(&wallet.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

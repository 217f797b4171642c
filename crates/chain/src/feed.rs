//! Transaction feed backed by ERC-20 `Transfer` logs of the payment token.

use std::collections::HashMap;

use alloy::{
    consensus::BlockHeader, eips::BlockNumberOrTag, primitives::Address, providers::Provider,
    rpc::types::Filter, sol_types::SolEvent,
};
use async_trait::async_trait;
use neuraproof_core::{AppError, AppResult, Settings, Transaction, TransactionFeed};

use crate::abi::ERC20;
use crate::decoder::decode_payment;
use crate::provider::ChainProvider;

/// Scans the last `lookback_blocks` blocks for payment-token transfers into a
/// wallet, in windows of `batch_size` blocks.
pub struct ChainFeed {
    provider: ChainProvider,
    token: Address,
    decimals: u8,
    lookback_blocks: u64,
    batch_size: u64,
}

impl ChainFeed {
    pub fn new(provider: ChainProvider, settings: &Settings) -> AppResult<Self> {
        let token = settings.payment_token.parse::<Address>().map_err(|e| {
            AppError::Config(format!("PAYMENT_TOKEN `{}`: {e}", settings.payment_token))
        })?;
        if settings.batch_size == 0 {
            return Err(AppError::Config("BATCH_SIZE must be positive".into()));
        }
        Ok(Self {
            provider,
            token,
            decimals: settings.token_decimals,
            lookback_blocks: settings.lookback_blocks,
            batch_size: settings.batch_size,
        })
    }

    /// Warn when the RPC endpoint serves a different chain than configured.
    pub async fn check_chain(&self, expected: u64) -> AppResult<()> {
        let actual = self.provider.get_chain_id().await.map_err(rpc_unavailable)?;
        if actual != expected {
            tracing::warn!(expected = expected, actual = actual, "RPC endpoint is on an unexpected chain");
        }
        Ok(())
    }

    async fn block_time(&self, block_number: u64, cache: &mut HashMap<u64, u64>) -> AppResult<u64> {
        if let Some(ts) = cache.get(&block_number) {
            return Ok(*ts);
        }
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await
            .map_err(rpc_unavailable)?
            .ok_or_else(|| AppError::FeedUnavailable(format!("block {block_number} not found")))?;
        let ts = block.header.timestamp();
        cache.insert(block_number, ts);
        Ok(ts)
    }
}

fn rpc_unavailable(e: impl std::fmt::Display) -> AppError {
    AppError::FeedUnavailable(e.to_string())
}

#[async_trait]
impl TransactionFeed for ChainFeed {
    async fn fetch(&self, wallet: &str) -> AppResult<Vec<Transaction>> {
        let wallet_address = wallet
            .trim()
            .parse::<Address>()
            .map_err(|e| AppError::Validation(format!("`{wallet}` is not an address: {e}")))?;

        let head = self.provider.get_block_number().await.map_err(rpc_unavailable)?;
        let mut from = head.saturating_sub(self.lookback_blocks);
        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        let mut transactions = Vec::new();

        while from <= head {
            let to = std::cmp::min(from + self.batch_size - 1, head);

            let filter = Filter::new()
                .address(self.token)
                .event_signature(ERC20::Transfer::SIGNATURE_HASH)
                .topic2(wallet_address.into_word())
                .from_block(from)
                .to_block(to);

            let logs = self.provider.get_logs(&filter).await.map_err(rpc_unavailable)?;
            tracing::debug!(from = from, to = to, count = logs.len(), "Fetched transfer logs");

            for log in &logs {
                let event = decode_payment(log).inspect_err(|e| {
                    tracing::error!(error = %e, "Transfer log failed to decode");
                })?;
                let block_time = match event.block_timestamp {
                    Some(ts) => ts,
                    None => self.block_time(event.block_number, &mut timestamps).await?,
                };
                transactions.push(event.into_transaction(self.decimals, block_time)?);
            }

            from = to + 1;
        }

        tracing::info!(
            wallet = %wallet,
            head = head,
            count = transactions.len(),
            "Scanned payment history"
        );
        Ok(transactions)
    }
}

use std::str::FromStr;

use alloy::primitives::{Address, U256, utils::format_units};
use alloy::rpc::types::Log;
use chrono::{DateTime, Utc};
use neuraproof_core::{AppError, AppResult, Transaction};
use rust_decimal::Decimal;

use crate::abi::ERC20;

/// A decoded ERC-20 `Transfer` into a watched wallet.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub token_address: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    pub block_number: u64,
    pub block_timestamp: Option<u64>,
    pub transaction_hash: String,
    pub log_index: u64,
}

/// Attempt to decode a log as an ERC-20 `Transfer` event.
pub fn decode_transfer_log(log: &Log) -> Option<PaymentEvent> {
    let block_number = log.block_number?;
    let log_index = log.log_index?;
    let tx_hash = log
        .transaction_hash
        .map(|h| format!("{h:#x}"))
        .unwrap_or_default();

    let decoded = log.log_decode::<ERC20::Transfer>().ok()?;
    let d = decoded.inner.data;

    Some(PaymentEvent {
        token_address: log.address(),
        from: d.from,
        to: d.to,
        amount: d.value,
        block_number,
        block_timestamp: log.block_timestamp,
        transaction_hash: tx_hash,
        log_index,
    })
}

/// Decode a log the feed filtered as a `Transfer`. Failure is an error rather
/// than a skip, since a dropped payment would understate income.
pub fn decode_payment(log: &Log) -> AppResult<PaymentEvent> {
    decode_transfer_log(log).ok_or_else(|| {
        AppError::Decode(format!(
            "undecodable Transfer log (tx {:?}, index {:?})",
            log.transaction_hash, log.log_index
        ))
    })
}

/// Convert a raw token amount to a decimal using the token's decimals.
pub fn amount_to_decimal(value: U256, decimals: u8) -> AppResult<Decimal> {
    let formatted = format_units(value, decimals)
        .map_err(|e| AppError::Decode(format!("amount {value}: {e}")))?;
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };
    Decimal::from_str(trimmed).map_err(|e| AppError::Decode(format!("amount {formatted}: {e}")))
}

impl PaymentEvent {
    /// Normalize into an engine transaction stamped at `block_time` (unix seconds).
    pub fn into_transaction(self, decimals: u8, block_time: u64) -> AppResult<Transaction> {
        let timestamp = i64::try_from(block_time)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| AppError::Decode(format!("block timestamp {block_time}")))?;
        let amount = amount_to_decimal(self.amount, decimals)?;
        let id = format!("{}:{}", self.transaction_hash, self.log_index);
        Transaction::new(
            id.clone(),
            format!("{:#x}", self.from),
            format!("{:#x}", self.to),
            amount,
            timestamp,
            "ERC-20 transfer",
            self.transaction_hash,
        )
        .map_err(|e| AppError::Decode(format!("transfer {id}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};
    use alloy::sol_types::SolEvent;
    use rust_decimal_macros::dec;

    const TOKEN: Address = address!("dd2fd4581271e230360230f9337d5c0430bf44c0");
    const EMPLOYER: Address = address!("8626f6940e2eb28930efb4cef49b2d1f2c9c1199");
    const WALLET: Address = address!("742d35cc6634c0532925a3b844bc9e7595f1e123");

    fn transfer_log(value: U256) -> Log {
        let event = ERC20::Transfer {
            from: EMPLOYER,
            to: WALLET,
            value,
        };
        Log {
            inner: alloy::primitives::Log {
                address: TOKEN,
                data: event.encode_log_data(),
            },
            block_number: Some(1_200),
            block_timestamp: Some(1_735_732_800),
            transaction_hash: Some(b256!(
                "00000000000000000000000000000000000000000000000000000000000000aa"
            )),
            log_index: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn amounts_respect_decimals() {
        let raw = U256::from(1_500_250_000_000_000_000_000u128);
        assert_eq!(amount_to_decimal(raw, 18).unwrap(), dec!(1500.25));
        assert_eq!(amount_to_decimal(U256::from(2_500_000u64), 6).unwrap(), dec!(2.5));
        assert_eq!(amount_to_decimal(U256::ZERO, 18).unwrap(), dec!(0));
    }

    #[test]
    fn oversized_amount_is_a_decode_error() {
        assert!(matches!(
            amount_to_decimal(U256::MAX, 0),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn decodes_transfer_into_transaction() {
        let value = U256::from(3_000_000_000_000_000_000_000u128);
        let event = decode_transfer_log(&transfer_log(value)).unwrap();
        assert_eq!(event.from, EMPLOYER);
        assert_eq!(event.to, WALLET);
        assert_eq!(event.amount, value);
        assert_eq!(event.block_number, 1_200);

        let tx = event.into_transaction(18, 1_735_732_800).unwrap();
        assert_eq!(tx.amount, dec!(3000));
        assert_eq!(tx.from, format!("{EMPLOYER:#x}"));
        assert!(tx.id.ends_with(":3"));
        assert_eq!(tx.timestamp.timestamp(), 1_735_732_800);
    }

    #[test]
    fn log_without_block_is_a_decode_error() {
        let mut log = transfer_log(U256::from(1u64));
        log.block_number = None;
        assert!(decode_transfer_log(&log).is_none());
        assert!(matches!(decode_payment(&log), Err(AppError::Decode(_))));
    }

    #[test]
    fn amount_above_transaction_bound_is_a_decode_error() {
        let event = decode_payment(&transfer_log(U256::from(2_000_000_000_000_000u64))).unwrap();
        let err = event.into_transaction(0, 1_735_732_800).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }
}

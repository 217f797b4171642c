/// EVM chain id identifying the network a wallet is connected to.
pub type NetworkId = u64;

/// Neura testnet chain id.
pub const NEURA_TESTNET: NetworkId = 267;

/// Wallet connectivity, supplied by whatever layer talks to the user's wallet.
pub trait WalletCapability: Send + Sync {
    fn connected_address(&self) -> Option<String>;
    fn network(&self) -> NetworkId;
}

/// A wallet whose address and network are already known to the caller,
/// e.g. taken from a signed API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedWallet {
    address: Option<String>,
    network: NetworkId,
}

impl ConnectedWallet {
    pub fn new(address: impl Into<String>, network: NetworkId) -> Self {
        Self {
            address: Some(address.into()),
            network,
        }
    }

    pub fn disconnected(network: NetworkId) -> Self {
        Self {
            address: None,
            network,
        }
    }
}

impl WalletCapability for ConnectedWallet {
    fn connected_address(&self) -> Option<String> {
        self.address.clone()
    }

    fn network(&self) -> NetworkId {
        self.network
    }
}

/// Per-request context handed to the issuer.
pub struct Session<'a> {
    pub wallet: &'a dyn WalletCapability,
    pub jurisdiction: &'a str,
}

/// `0x` followed by 40 hex digits.
pub fn is_evm_address(value: &str) -> bool {
    value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Shorten an address for display: `0x742d...E123`.
pub fn shorten_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_shape() {
        assert!(is_evm_address("0x742d35Cc6634C0532925a3b844Bc9e7595f1E123"));
        assert!(!is_evm_address("0x1234...5678"));
        assert!(!is_evm_address("742d35Cc6634C0532925a3b844Bc9e7595f1E123"));
    }

    #[test]
    fn shortens_long_addresses_only() {
        assert_eq!(
            shorten_address("0x742d35Cc6634C0532925a3b844Bc9e7595f1E123"),
            "0x742d...E123"
        );
        assert_eq!(shorten_address("0xabc"), "0xabc");
    }

    #[test]
    fn disconnected_wallet_has_no_address() {
        let w = ConnectedWallet::disconnected(NEURA_TESTNET);
        assert!(w.connected_address().is_none());
        assert_eq!(w.network(), 267);
    }
}

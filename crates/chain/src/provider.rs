use alloy::providers::RootProvider;

/// Read-only RPC provider used by the feed. No fillers: the feed never sends
/// transactions.
pub type ChainProvider = RootProvider;

/// Create an HTTP provider from an RPC URL string.
pub fn create_provider(rpc_url: &str) -> eyre::Result<ChainProvider> {
    let url = rpc_url.parse()?;
    Ok(RootProvider::new_http(url))
}

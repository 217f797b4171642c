pub mod abi;
pub mod decoder;
pub mod feed;
pub mod provider;

pub use abi::ERC20;
pub use decoder::{PaymentEvent, amount_to_decimal, decode_payment, decode_transfer_log};
pub use feed::ChainFeed;
pub use provider::{ChainProvider, create_provider};

pub mod config;
pub mod error;
pub mod feed;
pub mod income;
pub mod issuer;
pub mod jurisdiction;
pub mod models;
pub mod notification;
pub mod proof;
pub mod registry;
pub mod telemetry;
pub mod verify;
pub mod wallet;

pub use config::Settings;
pub use error::{AppError, AppResult};
pub use feed::{FeedPolicy, MemoryFeed, TransactionFeed, fetch_with_policy};
pub use income::{aggregate, aggregate_at};
pub use issuer::Issuer;
pub use jurisdiction::{Jurisdiction, JurisdictionStatus, JurisdictionTable};
pub use models::{IncomeProfile, MonthlyIncome, PaymentFrequency, ProofRecord, Transaction};
pub use notification::Notification;
pub use proof::{ProofDraft, fingerprint};
pub use registry::{MemoryRegistry, ProofRegistry, RevocationEvent};
pub use verify::{QueryKind, Resolver, VerificationResult};
pub use wallet::{ConnectedWallet, NetworkId, Session, WalletCapability};

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::jurisdiction::JurisdictionTable;
use crate::models::{IncomeProfile, ProofRecord};
use crate::proof::ProofDraft;
use crate::registry::ProofRegistry;
use crate::wallet::{NetworkId, Session, is_evm_address};

/// Issues proof records into an injected registry.
///
/// Every precondition (connected wallet, network, jurisdiction) is checked
/// before the registry is touched, so a rejected issuance leaves no trace.
pub struct Issuer {
    registry: Arc<dyn ProofRegistry>,
    jurisdictions: JurisdictionTable,
    expected_network: Option<NetworkId>,
    token_uri_base: String,
}

impl Issuer {
    pub fn new(registry: Arc<dyn ProofRegistry>, jurisdictions: JurisdictionTable) -> Self {
        Self {
            registry,
            jurisdictions,
            expected_network: None,
            token_uri_base: "ipfs://QmNeuraProof".to_string(),
        }
    }

    /// Require wallets to be connected to `network`.
    pub fn with_network(mut self, network: NetworkId) -> Self {
        self.expected_network = Some(network);
        self
    }

    pub fn with_token_uri_base(mut self, base: impl Into<String>) -> Self {
        self.token_uri_base = base.into();
        self
    }

    pub fn jurisdictions(&self) -> &JurisdictionTable {
        &self.jurisdictions
    }

    /// Issue a proof, letting the registry allocate the token id.
    pub async fn issue(
        &self,
        profile: &IncomeProfile,
        session: &Session<'_>,
    ) -> AppResult<ProofRecord> {
        let draft = self.draft(profile, session)?;
        let record = self.registry.append_next(draft).await?;
        log_issued(&record, session.jurisdiction);
        Ok(record)
    }

    /// Issue a proof under a caller-supplied token id.
    ///
    /// The registry rejects, with `DuplicateTokenId`, any id not greater than
    /// every id already issued.
    pub async fn issue_with_id(
        &self,
        profile: &IncomeProfile,
        session: &Session<'_>,
        token_id: u64,
    ) -> AppResult<ProofRecord> {
        if token_id == 0 {
            return Err(AppError::Validation("token id must be positive".into()));
        }
        let record = self.draft(profile, session)?.seal(token_id);
        self.registry.append(record.clone()).await?;
        log_issued(&record, session.jurisdiction);
        Ok(record)
    }

    fn draft(&self, profile: &IncomeProfile, session: &Session<'_>) -> AppResult<ProofDraft> {
        let jurisdiction = self.jurisdictions.check(session.jurisdiction).inspect_err(|e| {
            tracing::warn!(jurisdiction = %session.jurisdiction, error = %e, "Issuance refused");
        })?;

        let wallet = session
            .wallet
            .connected_address()
            .ok_or_else(|| AppError::Validation("no wallet connected".into()))?;
        if !is_evm_address(&wallet) {
            return Err(AppError::Validation(format!(
                "`{wallet}` is not a wallet address"
            )));
        }

        if let Some(expected) = self.expected_network {
            let actual = session.wallet.network();
            if actual != expected {
                return Err(AppError::Validation(format!(
                    "wallet is on network {actual}, expected {expected}"
                )));
            }
        }

        tracing::debug!(wallet = %wallet, jurisdiction = %jurisdiction.code, "Issuance permitted");
        Ok(ProofDraft::new(
            profile,
            wallet,
            Utc::now(),
            self.token_uri_base.clone(),
        ))
    }
}

fn log_issued(record: &ProofRecord, jurisdiction: &str) {
    tracing::info!(
        token_id = record.token_id,
        wallet = %record.wallet_address,
        jurisdiction = %jurisdiction,
        hash = %record.verification_hash,
        "Proof issued"
    );
}

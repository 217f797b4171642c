use serde::Serialize;

use crate::error::AppError;
use crate::models::{IncomeProfile, ProofRecord};
use crate::verify::VerificationResult;
use crate::wallet::shorten_address;

/// User-facing notice produced by front ends (API, CLI) after an engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
    Success { title: String, message: String },
    Error { title: String, message: String },
    Info { title: String, message: String },
    Warning { title: String, message: String },
}

impl Notification {
    pub fn title(&self) -> &str {
        match self {
            Notification::Success { title, .. }
            | Notification::Error { title, .. }
            | Notification::Info { title, .. }
            | Notification::Warning { title, .. } => title,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Notification::Success { message, .. }
            | Notification::Error { message, .. }
            | Notification::Info { message, .. }
            | Notification::Warning { message, .. } => message,
        }
    }

    pub fn scan_complete(profile: &IncomeProfile) -> Self {
        if profile.payment_count == 0 {
            return Notification::Info {
                title: "Scan Complete".into(),
                message: "No incoming payments found for this wallet".into(),
            };
        }
        Notification::Success {
            title: "Scan Complete".into(),
            message: format!(
                "Found {} transactions from {} employers",
                profile.payment_count, profile.employer_count
            ),
        }
    }

    pub fn proof_minted(record: &ProofRecord) -> Self {
        Notification::Success {
            title: "Proof Minted".into(),
            message: format!(
                "Income proof #{} has been issued to {}",
                record.token_id,
                shorten_address(&record.wallet_address)
            ),
        }
    }

    pub fn verification(result: &VerificationResult) -> Self {
        match (result.found, result.valid) {
            (true, true) => Notification::Success {
                title: "Proof Verified".into(),
                message: "Income proof found and validated".into(),
            },
            (true, false) => Notification::Warning {
                title: "Proof Invalid".into(),
                message: "Income proof exists but is revoked or fails its integrity check".into(),
            },
            (false, _) => Notification::Error {
                title: "Not Found".into(),
                message: "No income proof found for the given input".into(),
            },
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::JurisdictionBlocked(j) => Notification::Warning {
                title: "Jurisdiction Blocked".into(),
                message: format!(
                    "Minting is not available in {j} due to regulatory restrictions"
                ),
            },
            AppError::Validation(msg) => Notification::Warning {
                title: "Invalid Request".into(),
                message: msg.clone(),
            },
            AppError::FeedUnavailable(_) => Notification::Error {
                title: "Scan Failed".into(),
                message: "Transaction history is temporarily unavailable".into(),
            },
            other => Notification::Error {
                title: "Error".into(),
                message: other.to_string(),
            },
        }
    }
}

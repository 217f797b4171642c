use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Whether proofs may be issued for a jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JurisdictionStatus {
    Permitted,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub code: String,
    pub name: String,
    pub status: JurisdictionStatus,
}

/// Static allow/deny policy consulted before issuance. Codes are matched
/// case-insensitively and stored upper-case.
#[derive(Debug, Clone, Default)]
pub struct JurisdictionTable {
    entries: BTreeMap<String, Jurisdiction>,
}

impl JurisdictionTable {
    /// The catalogue shipped with the application.
    pub fn standard() -> Self {
        let mut table = Self::default();
        for (code, name) in [
            ("US", "United States"),
            ("UK", "United Kingdom"),
            ("EU", "European Union"),
            ("CA", "Canada"),
            ("AU", "Australia"),
            ("SG", "Singapore"),
            ("JP", "Japan"),
        ] {
            table.insert(code, name, JurisdictionStatus::Permitted);
        }
        for (code, name) in [("KP", "North Korea"), ("IR", "Iran"), ("CU", "Cuba")] {
            table.insert(code, name, JurisdictionStatus::Blocked);
        }
        table
    }

    pub fn insert(&mut self, code: &str, name: &str, status: JurisdictionStatus) {
        let code = code.trim().to_ascii_uppercase();
        self.entries.insert(
            code.clone(),
            Jurisdiction {
                code,
                name: name.to_string(),
                status,
            },
        );
    }

    pub fn lookup(&self, code: &str) -> Option<&Jurisdiction> {
        self.entries.get(&code.trim().to_ascii_uppercase())
    }

    /// Gate an issuance. Blocked codes fail with `JurisdictionBlocked`,
    /// unknown codes with `Validation`.
    pub fn check(&self, code: &str) -> AppResult<&Jurisdiction> {
        match self.lookup(code) {
            Some(j) if j.status == JurisdictionStatus::Blocked => Err(
                AppError::JurisdictionBlocked(format!("{} ({})", j.code, j.name)),
            ),
            Some(j) => Ok(j),
            None => Err(AppError::Validation(format!(
                "unknown jurisdiction code `{}`",
                code.trim()
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Jurisdiction> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_permits_and_blocks() {
        let table = JurisdictionTable::standard();
        assert_eq!(table.check("US").unwrap().name, "United States");
        assert!(matches!(
            table.check("KP"),
            Err(AppError::JurisdictionBlocked(_))
        ));
        assert!(matches!(
            table.check("ir"),
            Err(AppError::JurisdictionBlocked(_))
        ));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = JurisdictionTable::standard();
        assert_eq!(table.lookup(" sg ").unwrap().code, "SG");
    }

    #[test]
    fn unknown_code_is_a_validation_error() {
        let table = JurisdictionTable::standard();
        assert!(matches!(table.check("ZZ"), Err(AppError::Validation(_))));
    }

    #[test]
    fn custom_entries_override() {
        let mut table = JurisdictionTable::standard();
        table.insert("us", "United States", JurisdictionStatus::Blocked);
        assert!(table.check("US").is_err());
        assert_eq!(table.iter().count(), 10);
    }
}

//! Resolves decoded account rows onto canonical statement fields.
//!
//! Lookup order: the explicit mapping table (keyed by normalized account
//! name), then a fixed default keyed by the source's declared account type.
//! An account matching neither is dropped by the caller with a warning —
//! never a fatal error.

use crate::schema::{AccountMapping, AllocationMethod, CanonicalField};
use std::collections::BTreeMap;

/// Name-keyed index over the explicit mapping table, built once per run.
#[derive(Debug, Clone)]
pub struct MappingIndex {
    by_name: BTreeMap<String, AccountMapping>,
}

impl MappingIndex {
    pub fn new(mappings: &[AccountMapping]) -> Self {
        let by_name = mappings
            .iter()
            .map(|m| (normalize_account_name(&m.source_account_name), m.clone()))
            .collect();
        Self { by_name }
    }

    /// Resolves an account to exactly one mapping, or `None` when neither
    /// the explicit table nor the type defaults cover it.
    ///
    /// Type-default mappings allocate with `Average`: an account nobody
    /// configured has no line-of-business opinion of its own.
    pub fn resolve(&self, account_name: &str, account_type: Option<&str>) -> Option<AccountMapping> {
        if let Some(mapping) = self.by_name.get(&normalize_account_name(account_name)) {
            return Some(mapping.clone());
        }

        let account_type = account_type?;
        let field = default_field_for_type(account_type)?;

        Some(AccountMapping {
            source_account_name: account_name.to_string(),
            source_account_type: Some(account_type.to_string()),
            field,
            method: AllocationMethod::Average,
        })
    }
}

/// Trim, lowercase, and collapse internal whitespace runs to single spaces.
pub fn normalize_account_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Default canonical field per declared account type. Matched ignoring case
/// and whitespace, so `AccountsReceivable` and `Accounts Receivable` both
/// land on the same entry.
pub fn default_field_for_type(account_type: &str) -> Option<CanonicalField> {
    let key: String = account_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    match key.as_str() {
        "bank" | "cash" => Some(CanonicalField::Cash),
        "accountsreceivable" => Some(CanonicalField::Ar),
        "inventory" => Some(CanonicalField::Inventory),
        "othercurrentasset" => Some(CanonicalField::OtherCurrentAssets),
        "fixedasset" => Some(CanonicalField::FixedAssets),
        "otherasset" => Some(CanonicalField::OtherAssets),
        "accountspayable" => Some(CanonicalField::Ap),
        "creditcard" => Some(CanonicalField::Ap),
        "othercurrentliability" => Some(CanonicalField::OtherCurrentLiabilities),
        "longtermliability" => Some(CanonicalField::Ltd),
        "equity" => Some(CanonicalField::TotalEquity),
        "income" | "otherincome" => Some(CanonicalField::Revenue),
        "costofgoodssold" | "cogs" => Some(CanonicalField::CogsTotal),
        "expense" | "otherexpense" => Some(CanonicalField::Expense),
        _ => None,
    }
}

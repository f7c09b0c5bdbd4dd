use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed statement line items every source account is mapped onto.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Revenue,
    CogsTotal,
    Expense,
    Cash,
    Ar,
    Inventory,
    OtherCurrentAssets,
    CurrentAssets,
    FixedAssets,
    OtherAssets,
    TotalAssets,
    Ap,
    OtherCurrentLiabilities,
    CurrentLiabilities,
    Ltd,
    TotalLiab,
    TotalEquity,
    TotalLAndE,
}

/// A leaf account row as it appears in a decoded source document: a display
/// name, an optional source-side account id, and one raw text cell per period
/// column. Values stay as text until a period is extracted because source
/// exports are noisy (blanks, currency symbols, thousands separators).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeafRow {
    pub name: String,
    pub account_id: Option<String>,
    pub period_values: Vec<String>,
}

impl LeafRow {
    pub fn new(name: impl Into<String>, period_values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            account_id: None,
            period_values,
        }
    }
}

/// A node in the section-oriented report tree returned by the external
/// bookkeeping platform. Only sections carry children; a section may carry a
/// summary row holding its per-period totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum ReportNode {
    Section {
        label: String,
        children: Vec<ReportNode>,
        summary: Option<LeafRow>,
    },
    Leaf(LeafRow),
}

/// A report tree plus the chronological dates of its period columns, as
/// supplied by the collaborator that fetched the report. The platform's
/// reserved name column is already stripped: `period_values` in every leaf
/// align index-for-index with `period_dates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub period_dates: Vec<NaiveDate>,
    pub root: ReportNode,
}

/// The unit exchanged between the decoders and the mapping/allocation stages:
/// one account's value for exactly one period column.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountValue {
    pub account_name: String,
    pub account_id: String,
    pub amount: f64,
}

/// Strategy for deriving an account's percentage split across lines of
/// business.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase", tag = "method")]
pub enum AllocationMethod {
    #[schemars(
        description = "Fixed percentages per line of business, embedded in the mapping itself. Values should sum to 100."
    )]
    Manual { percentages: BTreeMap<String, f64> },

    #[schemars(
        description = "Split 100 evenly across the company's declared lines of business, distributing any remainder one point at a time from the first line onward."
    )]
    Average,

    #[schemars(
        description = "Split in proportion to the company's configured headcount per line of business. Falls back to Average when no headcount is configured."
    )]
    Headcount,

    #[schemars(
        description = "Split in proportion to configured revenue weights, else to trailing-12-month historical revenue by line of business, else to Average."
    )]
    RevenueWeighted,
}

/// Maps one source account onto a canonical field with an allocation method.
/// Supplied wholesale by the configuration collaborator before a run;
/// immutable during a run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountMapping {
    #[schemars(
        description = "The account's display name exactly as it appears in the source document. Matched after trimming, lowercasing, and collapsing internal whitespace."
    )]
    pub source_account_name: String,

    #[schemars(
        description = "The account type declared by the source, when it has one (trial-balance rows do, report-tree rows do not)."
    )]
    pub source_account_type: Option<String>,

    #[schemars(description = "The canonical statement field this account rolls into.")]
    pub field: CanonicalField,

    #[schemars(description = "How the mapped amount is split across lines of business.")]
    pub method: AllocationMethod,
}

/// Company-level context for a decode run: the declared lines of business and
/// optional weighting sources. Read-only during the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyContext {
    #[schemars(
        description = "The company's lines of business, in display order. Order matters: Average gives remainder points to the earliest lines."
    )]
    pub lines_of_business: Vec<String>,

    #[schemars(description = "Optional headcount per line of business, used by the Headcount method.")]
    pub headcount_weights: Option<BTreeMap<String, f64>>,

    #[schemars(
        description = "Optional revenue weighting per line of business, used by the RevenueWeighted method ahead of historical revenue."
    )]
    pub revenue_weights: Option<BTreeMap<String, f64>>,
}

/// The full configuration document a caller loads for one run: the explicit
/// mapping table plus the company context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    pub mappings: Vec<AccountMapping>,
    pub context: CompanyContext,
}

impl MappingConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MappingConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// One canonical monthly statement: totals per canonical field, and per field
/// a line-of-business breakdown whose values sum to the field total within
/// rounding tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub period_date: NaiveDate,
    pub totals: BTreeMap<CanonicalField, f64>,
    pub lob_breakdown: BTreeMap<CanonicalField, BTreeMap<String, f64>>,
}

impl MonthlyRecord {
    pub fn new(period_date: NaiveDate) -> Self {
        Self {
            period_date,
            totals: BTreeMap::new(),
            lob_breakdown: BTreeMap::new(),
        }
    }

    pub fn total(&self, field: CanonicalField) -> f64 {
        self.totals.get(&field).copied().unwrap_or(0.0)
    }
}

/// A recoverable anomaly collected during a run. The caller decides whether
/// and how to log these; nothing in this list aborts processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunWarning {
    pub message: String,
    pub account: Option<String>,
}

impl RunWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            account: None,
        }
    }

    pub fn for_account(message: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            account: Some(account.into()),
        }
    }
}

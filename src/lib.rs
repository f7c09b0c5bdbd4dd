//! # Statement Normalizer
//!
//! A library for converting periodic financial statements from heterogeneous
//! sources into one canonical time series of monthly records, with each
//! amount optionally split across named lines of business (LOB).
//!
//! ## Core Concepts
//!
//! - **Report Tree**: the nested, section-oriented statement shape returned
//!   by an external bookkeeping platform (sections with children and summary
//!   rows; leaf account rows with one value per period column)
//! - **Trial Balance**: a flat CSV export of account rows × date columns,
//!   the alternative source shape
//! - **Canonical Field**: the fixed statement line items (revenue, cash,
//!   totalAssets, …) every source account is mapped onto
//! - **Allocation**: splitting each mapped amount across lines of business
//!   by manual percentages, equal split, headcount, or revenue weighting
//!
//! Data flows one direction: raw source → decoder → per-period account
//! values → mapping resolver → allocation engine → monthly record assembler.
//! The pipeline is a pure function of its inputs; recoverable anomalies are
//! returned as structured warnings rather than logged ambiently or thrown.
//!
//! ## Example
//!
//! ```rust
//! use statement_normalizer::*;
//!
//! let raw = "Acct Type,Acct ID,Description,1/31/2023\n\
//!            Bank,101,Checking,5000\n\
//!            AccountsReceivable,102,Receivables,2000\n";
//!
//! let config = MappingConfig::default();
//! let out = normalize_trial_balance(raw, &config).unwrap();
//!
//! assert_eq!(out.records.len(), 1);
//! assert_eq!(out.records[0].total(CanonicalField::Cash), 5000.0);
//! ```

pub mod allocation;
pub mod assembler;
pub mod error;
pub mod mapping;
pub mod report_tree;
pub mod schema;
pub mod trial_balance;
pub mod utils;

pub use allocation::{average_split, Accumulator, Allocator, UNALLOCATED_LOB};
pub use assembler::{assemble, Assembled, StatementSource};
pub use error::{NormalizerError, Result};
pub use mapping::{default_field_for_type, normalize_account_name, MappingIndex};
pub use report_tree::{account_values_for_period, extract_leaf_rows, find_total};
pub use schema::*;
pub use trial_balance::{
    parse_amount, parse_date_column, parse_table, TrialBalanceRow, TrialBalanceTable,
};
pub use utils::round2;

use log::info;

pub struct StatementNormalizer;

impl StatementNormalizer {
    /// Runs the full decode → map → allocate → assemble pipeline over an
    /// already-decoded source.
    pub fn run(source: &StatementSource, config: &MappingConfig) -> Assembled {
        info!(
            "Normalizing statements with {} explicit mappings and {} lines of business",
            config.mappings.len(),
            config.context.lines_of_business.len()
        );
        assemble(source, &config.mappings, &config.context)
    }
}

/// Normalizes an already-decoded source document.
pub fn normalize_statements(source: &StatementSource, config: &MappingConfig) -> Assembled {
    StatementNormalizer::run(source, config)
}

/// Parses raw trial-balance text and normalizes it in one call. The only
/// error surfaced is a malformed header; everything else degrades into the
/// returned warnings.
pub fn normalize_trial_balance(raw_text: &str, config: &MappingConfig) -> Result<Assembled> {
    let table = parse_table(raw_text)?;
    Ok(StatementNormalizer::run(
        &StatementSource::TrialBalance(table),
        config,
    ))
}

/// Normalizes a report tree document.
pub fn normalize_report(document: ReportDocument, config: &MappingConfig) -> Assembled {
    StatementNormalizer::run(&StatementSource::Report(document), config)
}

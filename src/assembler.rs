//! Drives the decoders, the mapping resolver, and the allocation engine
//! across every period column, emitting one canonical monthly record per
//! column in chronological order.

use crate::allocation::{Accumulator, Allocator, UNALLOCATED_LOB};
use crate::mapping::MappingIndex;
use crate::report_tree::{account_values_for_period, extract_leaf_rows};
use crate::schema::{
    AccountMapping, AccountValue, CanonicalField, CompanyContext, MonthlyRecord, ReportDocument,
    RunWarning,
};
use crate::trial_balance::TrialBalanceTable;
use crate::utils::round2;
use chrono::NaiveDate;
use log::{debug, info};

/// A decoded source document, either shape feeding the same pipeline.
#[derive(Debug, Clone)]
pub enum StatementSource {
    Report(ReportDocument),
    TrialBalance(TrialBalanceTable),
}

/// The output of one run: records oldest to newest, plus every recoverable
/// anomaly encountered along the way.
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    pub records: Vec<MonthlyRecord>,
    pub warnings: Vec<RunWarning>,
}

/// Assembles canonical monthly records from a decoded source.
///
/// Trial-balance period columns are sorted by parsed date first; report
/// columns arrive chronological from the platform and are taken in order.
/// Unmapped accounts are dropped with a warning, never an error.
pub fn assemble(
    source: &StatementSource,
    mappings: &[AccountMapping],
    context: &CompanyContext,
) -> Assembled {
    let index = MappingIndex::new(mappings);
    let allocator = Allocator::new(context);

    let mut records: Vec<MonthlyRecord> = Vec::new();
    let mut warnings: Vec<RunWarning> = Vec::new();

    // (period_date, account values with optional declared type)
    let periods: Vec<(NaiveDate, Vec<(AccountValue, Option<String>)>)> = match source {
        StatementSource::Report(document) => {
            let rows = extract_leaf_rows(&document.root);
            info!(
                "Assembling {} report periods for {} leaf rows",
                document.period_dates.len(),
                rows.len()
            );
            document
                .period_dates
                .iter()
                .enumerate()
                .map(|(idx, date)| {
                    let values = account_values_for_period(&rows, idx)
                        .into_iter()
                        .map(|v| (v, None))
                        .collect();
                    (*date, values)
                })
                .collect()
        }
        StatementSource::TrialBalance(table) => {
            let periods = table.periods();
            info!(
                "Assembling {} trial balance periods across {} rows",
                periods.len(),
                table.rows.len()
            );
            periods
                .into_iter()
                .map(|(column, date)| {
                    let values = table
                        .balances_for_column(column)
                        .map(|(row, amount)| {
                            let value = AccountValue {
                                account_name: row.description.clone(),
                                account_id: row.account_id.clone(),
                                amount,
                            };
                            (value, Some(row.account_type.clone()))
                        })
                        .collect();
                    (date, values)
                })
                .collect()
        }
    };

    for (period_date, values) in periods {
        debug!("Assembling period {}", period_date);
        let mut accumulator = Accumulator::default();

        for (value, declared_type) in &values {
            let mapping = match index.resolve(&value.account_name, declared_type.as_deref()) {
                Some(mapping) => mapping,
                None => {
                    warnings.push(RunWarning::for_account(
                        "no mapping for account; value dropped",
                        &value.account_name,
                    ));
                    continue;
                }
            };

            allocator.allocate(value, &mapping, &records, &mut accumulator, &mut warnings);
        }

        let record = finalize_record(period_date, accumulator, &mut warnings);
        records.push(record);
    }

    Assembled { records, warnings }
}

/// Computes derived subtotals, reconciles any per-field residue into the
/// Unallocated bucket, and rounds everything to 2 decimal places.
fn finalize_record(
    period_date: NaiveDate,
    mut acc: Accumulator,
    warnings: &mut Vec<RunWarning>,
) -> MonthlyRecord {
    let get = |acc: &Accumulator, field: CanonicalField| -> f64 {
        acc.totals.get(&field).copied().unwrap_or(0.0)
    };

    // When a reported current-assets total exists and exceeds its mapped
    // components, the residual lands in other current assets (never
    // negative).
    if let Some(reported) = acc.totals.get(&CanonicalField::CurrentAssets).copied() {
        let components = get(&acc, CanonicalField::Cash)
            + get(&acc, CanonicalField::Ar)
            + get(&acc, CanonicalField::Inventory);
        let residual = (reported - components).max(0.0);
        let existing = get(&acc, CanonicalField::OtherCurrentAssets);
        if residual > existing {
            acc.totals
                .insert(CanonicalField::OtherCurrentAssets, residual);
        }
    }

    let current_assets = get(&acc, CanonicalField::Cash)
        + get(&acc, CanonicalField::Ar)
        + get(&acc, CanonicalField::Inventory)
        + get(&acc, CanonicalField::OtherCurrentAssets);
    if current_assets != 0.0 || acc.totals.contains_key(&CanonicalField::CurrentAssets) {
        acc.totals
            .insert(CanonicalField::CurrentAssets, current_assets);
    }

    if !acc.totals.contains_key(&CanonicalField::CurrentLiabilities) {
        let current_liabilities =
            get(&acc, CanonicalField::Ap) + get(&acc, CanonicalField::OtherCurrentLiabilities);
        if current_liabilities != 0.0 {
            acc.totals
                .insert(CanonicalField::CurrentLiabilities, current_liabilities);
        }
    }

    let total_liab =
        get(&acc, CanonicalField::CurrentLiabilities) + get(&acc, CanonicalField::Ltd);
    if total_liab != 0.0 || acc.totals.contains_key(&CanonicalField::TotalLiab) {
        acc.totals.insert(CanonicalField::TotalLiab, total_liab);
    }

    if !acc.totals.contains_key(&CanonicalField::TotalAssets) {
        let total_assets = current_assets
            + get(&acc, CanonicalField::FixedAssets)
            + get(&acc, CanonicalField::OtherAssets);
        if total_assets != 0.0 {
            acc.totals.insert(CanonicalField::TotalAssets, total_assets);
        }
    }

    // Accounting-identity fallback: with no explicit equity mapped, equity
    // is the residual of assets over liabilities.
    if !acc.totals.contains_key(&CanonicalField::TotalEquity) {
        let total_equity = get(&acc, CanonicalField::TotalAssets) - total_liab;
        if total_equity != 0.0 {
            acc.totals.insert(CanonicalField::TotalEquity, total_equity);
        }
    }

    let total_l_and_e = total_liab + get(&acc, CanonicalField::TotalEquity);
    if total_l_and_e != 0.0 {
        acc.totals.insert(CanonicalField::TotalLAndE, total_l_and_e);
    }

    // Any gap left between a field's total and its breakdown (a derived
    // total widened after allocation) is routed to Unallocated so every
    // field with a breakdown still reconciles.
    for (field, split) in acc.breakdown.iter_mut() {
        let total = acc.totals.get(field).copied().unwrap_or(0.0);
        let split_sum: f64 = split.values().sum();
        let residue = total - split_sum;
        if residue.abs() > 0.005 {
            warnings.push(RunWarning::new(format!(
                "{:?} total exceeds its allocated breakdown by {:.2}; routed to Unallocated",
                field, residue
            )));
            *split.entry(UNALLOCATED_LOB.to_string()).or_insert(0.0) += residue;
        }
    }

    let mut record = MonthlyRecord::new(period_date);
    record.totals = acc
        .totals
        .into_iter()
        .map(|(field, total)| (field, round2(total)))
        .collect();
    record.lob_breakdown = acc
        .breakdown
        .into_iter()
        .map(|(field, split)| {
            (
                field,
                split
                    .into_iter()
                    .map(|(lob, amount)| (lob, round2(amount)))
                    .collect(),
            )
        })
        .collect();

    // Rounding each share independently can leave the breakdown off the
    // rounded total (a cent per line of business in the worst case). The
    // remaining difference is absorbed into the largest share so every
    // breakdown sums to its total exactly.
    for (field, split) in record.lob_breakdown.iter_mut() {
        let total = record.totals.get(field).copied().unwrap_or(0.0);
        let split_sum: f64 = split.values().sum();
        let diff = round2(total - split_sum);
        if diff == 0.0 {
            continue;
        }
        let largest = split
            .iter()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(lob, _)| lob.clone());
        if let Some(lob) = largest {
            if let Some(amount) = split.get_mut(&lob) {
                *amount = round2(*amount + diff);
            }
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AllocationMethod, LeafRow, ReportNode};
    use crate::trial_balance::parse_table;
    use std::collections::BTreeMap;

    fn ctx(names: &[&str]) -> CompanyContext {
        CompanyContext {
            lines_of_business: names.iter().map(|n| n.to_string()).collect(),
            headcount_weights: None,
            revenue_weights: None,
        }
    }

    fn report_with_leaves(leaves: Vec<(&str, Vec<&str>)>, dates: Vec<NaiveDate>) -> ReportDocument {
        ReportDocument {
            period_dates: dates,
            root: ReportNode::Section {
                label: "Report".to_string(),
                children: leaves
                    .into_iter()
                    .map(|(name, values)| {
                        ReportNode::Leaf(LeafRow::new(
                            name,
                            values.into_iter().map(|v| v.to_string()).collect(),
                        ))
                    })
                    .collect(),
                summary: None,
            },
        }
    }

    #[test]
    fn test_trial_balance_type_defaults() {
        let table = parse_table(
            "Type,ID,Description,1/31/2023\n\
             Bank,101,Checking,5000\n\
             AccountsReceivable,102,Receivables,2000\n",
        )
        .unwrap();

        let out = assemble(
            &StatementSource::TrialBalance(table),
            &[],
            &CompanyContext::default(),
        );

        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(
            record.period_date,
            NaiveDate::from_ymd_opt(2023, 1, 31).unwrap()
        );
        assert_eq!(record.total(CanonicalField::Cash), 5000.0);
        assert_eq!(record.total(CanonicalField::Ar), 2000.0);
        assert_eq!(record.total(CanonicalField::CurrentAssets), 7000.0);
        assert_eq!(record.total(CanonicalField::TotalAssets), 7000.0);
        assert_eq!(record.total(CanonicalField::TotalEquity), 7000.0);
    }

    #[test]
    fn test_unmapped_account_dropped_with_warning() {
        let table = parse_table(
            "Type,ID,Description,1/31/2023\n\
             Hologram,999,Mystery,123\n",
        )
        .unwrap();

        let out = assemble(
            &StatementSource::TrialBalance(table),
            &[],
            &CompanyContext::default(),
        );

        assert!(out.records[0].totals.is_empty());
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].account.as_deref(), Some("Mystery"));
    }

    #[test]
    fn test_report_periods_in_date_order() {
        let doc = report_with_leaves(
            vec![("Sales", vec!["100", "200"])],
            vec![
                NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2023, 2, 28).unwrap(),
            ],
        );

        let mappings = vec![AccountMapping {
            source_account_name: "Sales".to_string(),
            source_account_type: None,
            field: CanonicalField::Revenue,
            method: AllocationMethod::Average,
        }];

        let out = assemble(&StatementSource::Report(doc), &mappings, &ctx(&["A"]));

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].total(CanonicalField::Revenue), 100.0);
        assert_eq!(out.records[1].total(CanonicalField::Revenue), 200.0);
        assert!(out.records[0].period_date < out.records[1].period_date);
    }

    #[test]
    fn test_trial_balance_columns_sorted_chronologically() {
        let table = parse_table(
            "Type,ID,Description,2/28/2023,1/31/2023\n\
             Bank,101,Checking,5200,5000\n",
        )
        .unwrap();

        let out = assemble(
            &StatementSource::TrialBalance(table),
            &[],
            &CompanyContext::default(),
        );

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].total(CanonicalField::Cash), 5000.0);
        assert_eq!(out.records[1].total(CanonicalField::Cash), 5200.0);
    }

    #[test]
    fn test_current_assets_subtotal_from_components() {
        let doc = report_with_leaves(
            vec![("Checking", vec!["3000"]), ("Receivables", vec!["1000"])],
            vec![NaiveDate::from_ymd_opt(2023, 3, 31).unwrap()],
        );

        let mappings = vec![
            AccountMapping {
                source_account_name: "Checking".to_string(),
                source_account_type: None,
                field: CanonicalField::Cash,
                method: AllocationMethod::Average,
            },
            AccountMapping {
                source_account_name: "Receivables".to_string(),
                source_account_type: None,
                field: CanonicalField::Ar,
                method: AllocationMethod::Average,
            },
        ];

        let out = assemble(&StatementSource::Report(doc), &mappings, &ctx(&["A"]));
        let record = &out.records[0];

        assert_eq!(record.total(CanonicalField::CurrentAssets), 4000.0);
        assert_eq!(record.total(CanonicalField::OtherCurrentAssets), 0.0);
    }

    #[test]
    fn test_reported_current_assets_residual() {
        // A reported current-assets total exceeds its mapped components;
        // the never-negative gap becomes other current assets and the
        // recomputed subtotal matches the report.
        let doc = report_with_leaves(
            vec![
                ("Checking", vec!["3000"]),
                ("Receivables", vec!["1000"]),
                ("Total Current Assets", vec!["5000"]),
            ],
            vec![NaiveDate::from_ymd_opt(2023, 3, 31).unwrap()],
        );

        let mappings = vec![
            AccountMapping {
                source_account_name: "Checking".to_string(),
                source_account_type: None,
                field: CanonicalField::Cash,
                method: AllocationMethod::Average,
            },
            AccountMapping {
                source_account_name: "Receivables".to_string(),
                source_account_type: None,
                field: CanonicalField::Ar,
                method: AllocationMethod::Average,
            },
            AccountMapping {
                source_account_name: "Total Current Assets".to_string(),
                source_account_type: None,
                field: CanonicalField::CurrentAssets,
                method: AllocationMethod::Average,
            },
        ];

        let out = assemble(&StatementSource::Report(doc), &mappings, &ctx(&["A"]));
        let record = &out.records[0];

        assert_eq!(record.total(CanonicalField::OtherCurrentAssets), 1000.0);
        assert_eq!(record.total(CanonicalField::CurrentAssets), 5000.0);
        assert_eq!(record.total(CanonicalField::TotalAssets), 5000.0);

        // The field with a breakdown still reconciles with its total.
        let split = &record.lob_breakdown[&CanonicalField::CurrentAssets];
        let sum: f64 = split.values().sum();
        assert!((sum - 5000.0).abs() <= 0.01);
    }

    #[test]
    fn test_equity_identity_fallback_with_liabilities() {
        let table = parse_table(
            "Type,ID,Description,1/31/2023\n\
             Bank,101,Checking,10000\n\
             AccountsPayable,201,Payables,3000\n\
             LongTermLiability,251,Loan,2000\n",
        )
        .unwrap();

        let out = assemble(
            &StatementSource::TrialBalance(table),
            &[],
            &CompanyContext::default(),
        );
        let record = &out.records[0];

        assert_eq!(record.total(CanonicalField::CurrentLiabilities), 3000.0);
        assert_eq!(record.total(CanonicalField::TotalLiab), 5000.0);
        assert_eq!(record.total(CanonicalField::TotalAssets), 10000.0);
        assert_eq!(record.total(CanonicalField::TotalEquity), 5000.0);
        assert_eq!(record.total(CanonicalField::TotalLAndE), 10000.0);
    }

    #[test]
    fn test_explicit_equity_suppresses_identity_fallback() {
        let table = parse_table(
            "Type,ID,Description,1/31/2023\n\
             Bank,101,Checking,10000\n\
             Equity,301,Share Capital,8000\n",
        )
        .unwrap();

        let out = assemble(
            &StatementSource::TrialBalance(table),
            &[],
            &CompanyContext::default(),
        );
        let record = &out.records[0];

        assert_eq!(record.total(CanonicalField::TotalEquity), 8000.0);
    }

    #[test]
    fn test_breakdown_reconciles_after_rounding() {
        let mappings = vec![AccountMapping {
            source_account_name: "Sales".to_string(),
            source_account_type: None,
            field: CanonicalField::Revenue,
            method: AllocationMethod::Manual {
                percentages: BTreeMap::from([
                    ("A".to_string(), 70.0),
                    ("B".to_string(), 30.0),
                ]),
            },
        }];

        let doc = report_with_leaves(
            vec![("Sales", vec!["2000"])],
            vec![NaiveDate::from_ymd_opt(2023, 1, 31).unwrap()],
        );

        let out = assemble(&StatementSource::Report(doc), &mappings, &ctx(&["A", "B"]));
        let record = &out.records[0];
        let split = &record.lob_breakdown[&CanonicalField::Revenue];

        assert_eq!(split["A"], 1400.0);
        assert_eq!(split["B"], 600.0);
        let sum: f64 = split.values().sum();
        assert!((sum - record.total(CanonicalField::Revenue)).abs() <= 0.01);
    }
}

//! Distributes mapped amounts across lines of business.
//!
//! Every method bottoms out in an equal split: configured weights are used
//! when present, `RevenueWeighted` tries trailing historical revenue next,
//! and with nothing configured at all the engine still produces a split
//! rather than failing. When there are no lines of business whatsoever, the
//! full amount lands in the `"Unallocated"` bucket so every dollar stays
//! traceable.

use crate::schema::{
    AccountMapping, AccountValue, AllocationMethod, CanonicalField, CompanyContext, MonthlyRecord,
    RunWarning,
};
use log::warn;
use std::collections::BTreeMap;

/// Sentinel line of business credited when no split can be derived.
pub const UNALLOCATED_LOB: &str = "Unallocated";

/// How many trailing records feed the historical-revenue weighting.
const REVENUE_TRAILING_MONTHS: usize = 12;

/// Per-field running totals and per-field, per-LOB breakdowns for one period.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pub totals: BTreeMap<CanonicalField, f64>,
    pub breakdown: BTreeMap<CanonicalField, BTreeMap<String, f64>>,
}

impl Accumulator {
    fn add(&mut self, field: CanonicalField, lob: &str, amount: f64) {
        *self
            .breakdown
            .entry(field)
            .or_default()
            .entry(lob.to_string())
            .or_insert(0.0) += amount;
    }
}

pub struct Allocator<'a> {
    context: &'a CompanyContext,
}

impl<'a> Allocator<'a> {
    pub fn new(context: &'a CompanyContext) -> Self {
        Self { context }
    }

    /// Resolves an allocation method to a concrete percentage map.
    ///
    /// `history` is the list of records assembled so far this run (oldest
    /// first); `RevenueWeighted` derives weights from its trailing revenue
    /// breakdown when no weights are configured. The chain is:
    /// configured weights → historical revenue → equal split. A weighting
    /// source that sums to zero falls through to the next level.
    pub fn resolve_percentages(
        &self,
        method: &AllocationMethod,
        history: &[MonthlyRecord],
    ) -> BTreeMap<String, f64> {
        match method {
            AllocationMethod::Manual { percentages } => percentages.clone(),
            AllocationMethod::Average => average_split(&self.context.lines_of_business),
            AllocationMethod::Headcount => self
                .context
                .headcount_weights
                .as_ref()
                .and_then(normalize_weights)
                .unwrap_or_else(|| average_split(&self.context.lines_of_business)),
            AllocationMethod::RevenueWeighted => self
                .context
                .revenue_weights
                .as_ref()
                .and_then(normalize_weights)
                .or_else(|| normalize_weights(&trailing_revenue_by_lob(history)))
                .unwrap_or_else(|| average_split(&self.context.lines_of_business)),
        }
    }

    /// Applies one mapped account value to the accumulator.
    ///
    /// The full amount is always credited to the field total. Percentages
    /// that do not sum to 100 are a configuration error, not a fatal one:
    /// the run warns and distributes the full amount proportionally over the
    /// given percentages so the breakdown still reconciles with the total.
    pub fn allocate(
        &self,
        value: &AccountValue,
        mapping: &AccountMapping,
        history: &[MonthlyRecord],
        accumulator: &mut Accumulator,
        warnings: &mut Vec<RunWarning>,
    ) {
        let percentages = self.resolve_percentages(&mapping.method, history);

        *accumulator.totals.entry(mapping.field).or_insert(0.0) += value.amount;

        let positive: Vec<(&String, f64)> = percentages
            .iter()
            .filter(|(_, pct)| **pct > 0.0)
            .map(|(lob, pct)| (lob, *pct))
            .collect();
        let positive_sum: f64 = positive.iter().map(|(_, pct)| pct).sum();

        if positive.is_empty() {
            if !percentages.is_empty() {
                push_warning(
                    warnings,
                    RunWarning::for_account(
                        "allocation percentages sum to 0; crediting Unallocated",
                        &value.account_name,
                    ),
                );
            }
            accumulator.add(mapping.field, UNALLOCATED_LOB, value.amount);
            return;
        }

        let raw_sum: f64 = percentages.values().sum();
        if (raw_sum - 100.0).abs() > 0.01 {
            push_warning(
                warnings,
                RunWarning::for_account(
                    format!(
                        "allocation percentages sum to {:.2}, expected 100; distributing proportionally",
                        raw_sum
                    ),
                    &value.account_name,
                ),
            );
        }

        for (lob, pct) in positive {
            accumulator.add(mapping.field, lob, value.amount * pct / positive_sum);
        }
    }
}

fn push_warning(warnings: &mut Vec<RunWarning>, warning: RunWarning) {
    warn!(
        "{}{}",
        warning.message,
        warning
            .account
            .as_deref()
            .map(|a| format!(" (account: {})", a))
            .unwrap_or_default()
    );
    warnings.push(warning);
}

/// Splits 100 evenly across the lines of business, handing the remainder
/// out one percentage point at a time from the first line onward, so the
/// map always sums to exactly 100 (3 lines → 34/33/33).
pub fn average_split(lines_of_business: &[String]) -> BTreeMap<String, f64> {
    let n = lines_of_business.len();
    if n == 0 {
        return BTreeMap::new();
    }

    let base = 100 / n;
    let remainder = 100 % n;

    lines_of_business
        .iter()
        .enumerate()
        .map(|(i, lob)| {
            let points = if i < remainder { base + 1 } else { base };
            (lob.clone(), points as f64)
        })
        .collect()
}

/// Scales arbitrary non-negative weights to percentages summing to 100.
/// Returns `None` when the weights sum to zero (or are empty), letting the
/// caller fall through to the next weighting source.
fn normalize_weights(weights: &BTreeMap<String, f64>) -> Option<BTreeMap<String, f64>> {
    let total: f64 = weights.values().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }

    Some(
        weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(lob, w)| (lob.clone(), w / total * 100.0))
            .collect(),
    )
}

/// Sums revenue per line of business over the trailing records of this run.
/// The Unallocated bucket is not a line of business and never seeds weights.
fn trailing_revenue_by_lob(history: &[MonthlyRecord]) -> BTreeMap<String, f64> {
    let start = history.len().saturating_sub(REVENUE_TRAILING_MONTHS);
    let mut by_lob = BTreeMap::new();

    for record in &history[start..] {
        if let Some(revenue) = record.lob_breakdown.get(&CanonicalField::Revenue) {
            for (lob, amount) in revenue {
                if lob != UNALLOCATED_LOB {
                    *by_lob.entry(lob.clone()).or_insert(0.0) += amount;
                }
            }
        }
    }

    by_lob
}

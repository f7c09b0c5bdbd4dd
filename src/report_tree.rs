//! Decoder for the section-oriented report tree returned by the external
//! bookkeeping platform.
//!
//! Two queries cover everything downstream needs: locate a named section
//! total, and list every leaf account row with its value at one period
//! column. Both are built on a single document-order tree walk.

use crate::schema::{AccountValue, LeafRow, ReportNode};

/// Walks sections depth-first in document order, handing each section's label
/// and summary row to `f`; the first `Some` returned by `f` wins.
///
/// The shared walk for every "find a section by fuzzy name" query, so match
/// precedence stays identical no matter which caller is searching.
pub fn find_map_section<T>(
    node: &ReportNode,
    f: &mut impl FnMut(&str, Option<&LeafRow>) -> Option<T>,
) -> Option<T> {
    match node {
        ReportNode::Leaf(_) => None,
        ReportNode::Section {
            label,
            children,
            summary,
        } => {
            if let Some(found) = f(label, summary.as_ref()) {
                return Some(found);
            }
            for child in children {
                if let Some(found) = find_map_section(child, f) {
                    return Some(found);
                }
            }
            None
        }
    }
}

fn visit_leaves<'a>(node: &'a ReportNode, out: &mut Vec<&'a LeafRow>) {
    match node {
        ReportNode::Leaf(row) => out.push(row),
        ReportNode::Section { children, .. } => {
            for child in children {
                visit_leaves(child, out);
            }
        }
    }
}

/// Finds the first section whose label contains `target_label`
/// (case-insensitive) and whose summary row has a parseable value at
/// `period_index`.
///
/// First match in document order wins, even when a more specific nested
/// section exists; a label like "Total Current Liabilities and Long-Term
/// Liabilities" will satisfy a search for "Current Liabilities" before any
/// child section is considered. The reference data source behaves this way
/// and downstream totals were reconciled against it, so the precedence is
/// kept as-is.
pub fn find_total(root: &ReportNode, target_label: &str, period_index: usize) -> Option<f64> {
    let needle = target_label.to_lowercase();
    find_map_section(root, &mut |label, summary| {
        if !label.to_lowercase().contains(&needle) {
            return None;
        }
        // A matching section without a usable summary value does not end the
        // search; keep walking in document order.
        summary
            .and_then(|row| row.period_values.get(period_index))
            .and_then(|cell| parse_cell(cell))
    })
}

/// Collects every leaf account row, depth-first in document order. Names are
/// not deduplicated: the same account name may legitimately appear under more
/// than one section.
pub fn extract_leaf_rows(root: &ReportNode) -> Vec<&LeafRow> {
    let mut rows = Vec::new();
    visit_leaves(root, &mut rows);
    rows
}

/// Reads each leaf's value at `period_index` as a non-negative amount.
///
/// Source data is untrusted: blank or malformed cells become 0, never an
/// error. Sign is discarded here because the enclosing statement section
/// carries the meaning, not the value's sign. Rows that come out exactly 0
/// are dropped so the allocation engine never splits a no-op.
pub fn account_values_for_period(rows: &[&LeafRow], period_index: usize) -> Vec<AccountValue> {
    rows.iter()
        .filter_map(|row| {
            let amount = row
                .period_values
                .get(period_index)
                .and_then(|cell| parse_cell(cell))
                .unwrap_or(0.0)
                .abs();

            if amount == 0.0 {
                return None;
            }

            Some(AccountValue {
                account_name: row.name.clone(),
                account_id: row.account_id.clone().unwrap_or_default(),
                amount,
            })
        })
        .collect()
}

/// Tolerant numeric parse for report cells: strips currency symbols,
/// thousands separators, and surrounding whitespace. Accounting-style
/// parentheses denote a negative, same as in trial-balance cells.
fn parse_cell(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let parenthesized = trimmed.starts_with('(') && trimmed.ends_with(')') && trimmed.len() > 1;
    let inner = if parenthesized {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '"') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let value = cleaned.parse::<f64>().ok()?;
    Some(if parenthesized { -value.abs() } else { value })
}

//! Decoder for flat trial-balance exports: one account row per line, one
//! balance column per date, `Acct Type, Acct ID, Description, <dates…>`.
//!
//! Produces the same per-period `AccountValue` shape as the report tree
//! decoder so both sources feed one downstream pipeline. Unlike the report
//! tree, amounts here stay SIGNED: contra accounts in a trial balance rely
//! on sign to net correctly against their section totals.

use crate::error::{NormalizerError, Result};
use crate::schema::AccountValue;
use crate::utils::{last_day_of_month, month_from_abbrev};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};

/// Columns a trial-balance header must have before the first date column.
const FIXED_COLUMNS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct TrialBalanceRow {
    pub account_type: String,
    pub account_id: String,
    pub description: String,
    pub amounts: Vec<String>,
}

/// A parsed trial-balance table. `date_columns` holds one entry per column
/// after the three fixed header columns; unparseable headers are kept as
/// `None` so row amounts stay index-aligned, and the assembler skips them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialBalanceTable {
    pub date_columns: Vec<Option<NaiveDate>>,
    pub rows: Vec<TrialBalanceRow>,
}

impl TrialBalanceTable {
    /// Date columns that parsed, as `(column_index, date)` sorted
    /// chronologically. Source exports do not guarantee column order.
    pub fn periods(&self) -> Vec<(usize, NaiveDate)> {
        let mut periods: Vec<(usize, NaiveDate)> = self
            .date_columns
            .iter()
            .enumerate()
            .filter_map(|(idx, date)| date.map(|d| (idx, d)))
            .collect();
        periods.sort_by_key(|(_, date)| *date);
        periods
    }

    /// Rows with a non-zero signed balance at one column. Rows without a
    /// cell in this column read as 0 and are dropped like other zeros.
    pub fn balances_for_column(
        &self,
        column_index: usize,
    ) -> impl Iterator<Item = (&TrialBalanceRow, f64)> {
        self.rows.iter().filter_map(move |row| {
            let amount = row
                .amounts
                .get(column_index)
                .map(|cell| parse_amount(cell))
                .unwrap_or(0.0);

            if amount == 0.0 {
                None
            } else {
                Some((row, amount))
            }
        })
    }

    /// Signed account values at one column, the same downstream shape the
    /// report tree decoder produces.
    pub fn account_values_for_column(&self, column_index: usize) -> Vec<AccountValue> {
        self.balances_for_column(column_index)
            .map(|(row, amount)| AccountValue {
                account_name: row.description.clone(),
                account_id: row.account_id.clone(),
                amount,
            })
            .collect()
    }
}

/// Parses raw trial-balance text.
///
/// The only fatal condition in the whole decode pipeline lives here: a
/// header with fewer than four columns means the export is not a trial
/// balance at all, and there is nothing sensible to recover. Everything
/// below the header is treated as untrusted: blank lines and rows with an
/// empty description (separator rows in source spreadsheets) are skipped
/// silently.
pub fn parse_table(raw_text: &str) -> Result<TrialBalanceTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(raw_text.trim().as_bytes());

    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => record.map_err(|e| NormalizerError::MalformedInput(e.to_string()))?,
        None => {
            return Err(NormalizerError::MalformedInput(
                "trial balance is empty".to_string(),
            ))
        }
    };

    if header.len() < FIXED_COLUMNS + 1 {
        return Err(NormalizerError::MalformedInput(format!(
            "trial balance header has {} columns, need at least {}",
            header.len(),
            FIXED_COLUMNS + 1
        )));
    }

    let date_columns: Vec<Option<NaiveDate>> = header
        .iter()
        .skip(FIXED_COLUMNS)
        .map(parse_date_column)
        .collect();

    let mut rows = Vec::new();
    for record in records {
        let record = match record {
            Ok(r) => r,
            // A mangled line is noise, not a reason to abort the sync.
            Err(_) => continue,
        };

        let description = record.get(2).unwrap_or("").trim();
        if description.is_empty() {
            continue;
        }

        rows.push(TrialBalanceRow {
            account_type: record.get(0).unwrap_or("").trim().to_string(),
            account_id: record.get(1).unwrap_or("").trim().to_string(),
            description: description.to_string(),
            amounts: record
                .iter()
                .skip(FIXED_COLUMNS)
                .map(|cell| cell.to_string())
                .collect(),
        });
    }

    Ok(TrialBalanceTable { date_columns, rows })
}

/// Parses one balance cell to a SIGNED value.
///
/// Accepts currency symbols, stray quotes, thousands separators, and both
/// negative spellings: accounting parentheses `(123.45)` and a leading `-`.
/// Non-numeric content parses to 0.
pub fn parse_amount(text: &str) -> f64 {
    let trimmed = text.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return 0.0;
    }

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

    let value = cleaned.parse::<f64>().unwrap_or(0.0);

    if parenthesized {
        -value.abs()
    } else {
        value
    }
}

/// Parses a date column header. Accepts `MM/DD/YYYY`, `YYYY-MM-DD`, and
/// `Mon YYYY` (which resolves to the last day of the month, the balance
/// as-of date). Anything else yields `None` and the column is skipped —
/// some exports carry non-date annotation columns.
pub fn parse_date_column(header: &str) -> Option<NaiveDate> {
    let trimmed = header.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    // "Mon YYYY"
    let mut parts = trimmed.split_whitespace();
    let month = parts.next().and_then(month_from_abbrev)?;
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    last_day_of_month(year, month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_basic() {
        let raw = "Acct Type,Acct ID,Description,1/31/2023,2/28/2023\n\
                   Bank,101,Checking,5000,5200\n\
                   AccountsReceivable,102,Receivables,2000,1800\n";

        let table = parse_table(raw).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.date_columns,
            vec![
                NaiveDate::from_ymd_opt(2023, 1, 31),
                NaiveDate::from_ymd_opt(2023, 2, 28),
            ]
        );
        assert_eq!(table.rows[0].description, "Checking");
        assert_eq!(table.rows[0].account_type, "Bank");
        assert_eq!(table.rows[0].amounts, vec!["5000", "5200"]);
    }

    #[test]
    fn test_parse_table_short_header_is_fatal() {
        let raw = "Acct Type,Acct ID,Description\nBank,101,Checking\n";
        let err = parse_table(raw).unwrap_err();
        assert!(matches!(err, NormalizerError::MalformedInput(_)));
    }

    #[test]
    fn test_parse_table_skips_blank_and_separator_rows() {
        let raw = "Type,ID,Description,1/31/2023\n\
                   \n\
                   Bank,101,,9999\n\
                   Bank,102,Savings,100\n";

        let table = parse_table(raw).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].description, "Savings");
    }

    #[test]
    fn test_parse_table_quoted_commas() {
        let raw = "Type,ID,Description,1/31/2023\n\
                   Expense,501,\"Meals, Travel & Entertainment\",\"1,234.56\"\n";

        let table = parse_table(raw).unwrap();
        assert_eq!(table.rows[0].description, "Meals, Travel & Entertainment");
        assert_eq!(parse_amount(&table.rows[0].amounts[0]), 1234.56);
    }

    #[test]
    fn test_parse_amount_signs() {
        assert_eq!(parse_amount("(123.45)"), -123.45);
        assert_eq!(parse_amount("-123.45"), -123.45);
        assert_eq!(parse_amount("$1,000.00"), 1000.0);
        assert_eq!(parse_amount("\"2,500\""), 2500.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("n/a"), 0.0);
    }

    #[test]
    fn test_parse_date_column_formats() {
        assert_eq!(
            parse_date_column("1/31/2023"),
            NaiveDate::from_ymd_opt(2023, 1, 31)
        );
        assert_eq!(
            parse_date_column("2023-06-30"),
            NaiveDate::from_ymd_opt(2023, 6, 30)
        );
        assert_eq!(
            parse_date_column("Feb 2024"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_date_column("Notes"), None);
        assert_eq!(parse_date_column(""), None);
    }

    #[test]
    fn test_periods_sorted_and_annotation_columns_skipped() {
        let raw = "Type,ID,Description,2/28/2023,Notes,1/31/2023\n\
                   Bank,101,Checking,5200,x,5000\n";

        let table = parse_table(raw).unwrap();
        let periods = table.periods();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0], (2, NaiveDate::from_ymd_opt(2023, 1, 31).unwrap()));
        assert_eq!(periods[1], (0, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()));
    }

    #[test]
    fn test_account_values_for_column() {
        let raw = "Type,ID,Description,1/31/2023\n\
                   Bank,101,Checking,5000\n\
                   Equity,301,Owner Draws,(1500)\n\
                   Bank,103,Dormant,0\n";

        let table = parse_table(raw).unwrap();
        let values = table.account_values_for_column(0);

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].account_name, "Checking");
        assert_eq!(values[0].amount, 5000.0);
        // Sign preserved for contra accounts.
        assert_eq!(values[1].account_name, "Owner Draws");
        assert_eq!(values[1].amount, -1500.0);
    }
}

//! Converts a small trial-balance export into canonical monthly records and
//! prints the totals and line-of-business breakdowns.
//!
//! Run with: cargo run --example trial_balance_demo

use statement_normalizer::*;
use std::collections::BTreeMap;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let raw = "Acct Type,Acct ID,Description,1/31/2023,2/28/2023,3/31/2023\n\
               Bank,101,Business Checking,\"25,000\",\"27,500\",\"31,200\"\n\
               AccountsReceivable,110,Trade Receivables,\"8,400\",\"9,100\",\"7,950\"\n\
               AccountsPayable,201,Trade Payables,\"5,200\",\"4,800\",\"6,100\"\n\
               LongTermLiability,251,Equipment Loan,\"12,000\",\"11,500\",\"11,000\"\n\
               Income,401,Consulting Fees,\"18,000\",\"16,500\",\"21,000\"\n\
               Income,402,Product Sales,\"6,000\",\"7,200\",\"5,400\"\n\
               Expense,501,Rent,(2500),(2500),(2500)\n";

    let config = MappingConfig {
        mappings: vec![AccountMapping {
            source_account_name: "Product Sales".to_string(),
            source_account_type: Some("Income".to_string()),
            field: CanonicalField::Revenue,
            method: AllocationMethod::Manual {
                percentages: BTreeMap::from([
                    ("Consulting".to_string(), 20.0),
                    ("Products".to_string(), 80.0),
                ]),
            },
        }],
        context: CompanyContext {
            lines_of_business: vec!["Consulting".to_string(), "Products".to_string()],
            headcount_weights: Some(BTreeMap::from([
                ("Consulting".to_string(), 7.0),
                ("Products".to_string(), 3.0),
            ])),
            revenue_weights: None,
        },
    };

    let out = normalize_trial_balance(raw, &config)?;

    for record in &out.records {
        println!("== {} ==", record.period_date);
        for (field, total) in &record.totals {
            println!("  {:?}: {:.2}", field, total);
            if let Some(split) = record.lob_breakdown.get(field) {
                for (lob, amount) in split {
                    println!("    {} -> {:.2}", lob, amount);
                }
            }
        }
    }

    if !out.warnings.is_empty() {
        println!("\nwarnings:");
        for warning in &out.warnings {
            println!("  {} ({:?})", warning.message, warning.account);
        }
    }

    Ok(())
}

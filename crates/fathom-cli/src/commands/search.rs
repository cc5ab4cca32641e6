//! Search command implementation

use std::io::Write;

use anyhow::Result;
use fathom_core::tools::SearchTransactionsParams;
use fathom_core::{SearchResults, Transaction, TransactionSearch};

use super::{format_amount, truncate};
use crate::cli::{OutputFormat, SearchArgs};

/// Map command-line flags onto the shared parameter record
pub fn search_params(args: SearchArgs) -> SearchTransactionsParams {
    SearchTransactionsParams {
        description: args.description,
        memo: args.memo,
        merchant: args.merchant,
        category: args.category,
        subcategory: args.subcategory,
        location: args.location,
        account_id: args.account_id,
        account_type: args.account_type,
        transaction_type: args.transaction_type,
        tags: Some(args.tags),
        amount_min: args.amount_min,
        amount_max: args.amount_max,
        date_from: args.from,
        date_to: args.to,
        is_pending: args.pending,
        is_recurring: args.recurring,
        limit: Some(args.limit),
    }
}

pub async fn cmd_search(search: &TransactionSearch, args: SearchArgs) -> Result<()> {
    let format = args.format;
    let show_query = args.show_query;
    let criteria = search_params(args).into_criteria()?;
    let results = search.search(&criteria, None).await?;

    let mut out = std::io::stdout().lock();
    if show_query {
        writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(&results.query_info.store_query)?
        )?;
    }
    write_results(&mut out, &results, format)
}

pub fn write_results<W: Write>(
    out: &mut W,
    results: &SearchResults,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(out, results),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, results)?;
            writeln!(out)?;
            Ok(())
        }
        OutputFormat::Csv => write_csv(out, &results.transactions),
    }
}

fn write_table<W: Write>(out: &mut W, results: &SearchResults) -> Result<()> {
    if results.transactions.is_empty() {
        writeln!(out, "No transactions matched.")?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(
        out,
        "📝 Transactions ({} of {} matches)",
        results.returned_count, results.total_hits
    )?;
    writeln!(
        out,
        "   ─────────────────────────────────────────────────────────────"
    )?;

    for tx in &results.transactions {
        writeln!(
            out,
            "   {} │ {:>10} │ {:<20} │ {:<12} │ {}",
            tx.transaction_date,
            format_amount(tx.amount),
            truncate(tx.merchant.as_deref().unwrap_or("-"), 20),
            truncate(tx.category.as_deref().unwrap_or("-"), 12),
            truncate(&tx.description, 40)
        )?;
    }

    Ok(())
}

fn write_csv<W: Write>(out: &mut W, transactions: &[Transaction]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "transaction_id",
        "transaction_date",
        "amount",
        "currency",
        "merchant",
        "category",
        "account_id",
        "account_type",
        "transaction_type",
        "description",
        "tags",
    ])?;

    for tx in transactions {
        writer.write_record(&[
            tx.transaction_id.clone(),
            tx.transaction_date.to_string(),
            format!("{:.2}", tx.amount),
            tx.currency.clone(),
            tx.merchant.clone().unwrap_or_default(),
            tx.category.clone().unwrap_or_default(),
            tx.account_id.clone(),
            tx.account_type.to_string(),
            tx.transaction_type.to_string(),
            tx.description.clone(),
            tx.tags.join(";"),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

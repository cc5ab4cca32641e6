//! Summary command implementation

use std::io::Write;

use anyhow::Result;
use fathom_core::tools::SummaryParams;
use fathom_core::{SummaryResult, TransactionSearch};

use super::format_amount;
use crate::cli::SummaryArgs;

pub fn summary_params(args: &SummaryArgs) -> SummaryParams {
    SummaryParams {
        date_from: args.from.clone(),
        date_to: args.to.clone(),
        category: args.category.clone(),
        account_type: args.account_type.clone(),
    }
}

pub async fn cmd_summary(search: &TransactionSearch, args: SummaryArgs) -> Result<()> {
    let request = summary_params(&args).into_request()?;
    let summary = search.summarize(&request, None).await?;

    let mut out = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &summary)?;
        writeln!(out)?;
        return Ok(());
    }
    write_summary(&mut out, &summary)
}

pub fn write_summary<W: Write>(out: &mut W, summary: &SummaryResult) -> Result<()> {
    if summary.transaction_count == 0 {
        writeln!(out, "No transactions matched.")?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "📊 Spending Summary")?;
    writeln!(
        out,
        "   ─────────────────────────────────────────────────────────────"
    )?;
    writeln!(out, "   Transactions:  {}", summary.transaction_count)?;
    writeln!(out, "   Spending:      ${:.2}", summary.total_spending)?;
    writeln!(out, "   Income:        ${:.2}", summary.total_income)?;
    writeln!(out, "   Net:           {}", format_amount(summary.total_amount))?;
    writeln!(out, "   Average:       {}", format_amount(summary.average_amount))?;

    if !summary.by_category.is_empty() {
        writeln!(out)?;
        writeln!(out, "   By category:")?;
        for (category, total) in &summary.by_category {
            writeln!(out, "     {:<20} {:>12}", category, format_amount(*total))?;
        }
    }

    if !summary.by_account_type.is_empty() {
        writeln!(out)?;
        writeln!(out, "   By account type:")?;
        for (account_type, total) in &summary.by_account_type {
            writeln!(out, "     {:<20} {:>12}", account_type, format_amount(*total))?;
        }
    }

    if !summary.monthly_trend.is_empty() {
        writeln!(out)?;
        writeln!(out, "   Monthly trend:")?;
        for month in &summary.monthly_trend {
            writeln!(
                out,
                "     {}  {:>12}  ({} transactions)",
                month.month,
                format_amount(month.total),
                month.transaction_count
            )?;
        }
    }

    Ok(())
}

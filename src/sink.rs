use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::EXPECTED_COLUMNS;
use crate::logging::log_sink;
use crate::transaction::{AnnotatedTransaction, Transaction};

pub const OUTPUT_COLUMNS: [&str; 5] = ["user ID", "timestamp", "merchant name", "amount", "triggered_rules"];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// `[1, 3]` style list; `[]` when nothing fired.
pub fn format_rules(rules: &[u8]) -> String {
    let inner: Vec<String> = rules.iter().map(|r| r.to_string()).collect();
    format!("[{}]", inner.join(", "))
}

/// The loader is line-based, so a line break inside a field can never be read back.
fn quote(field: &str, row: usize) -> Result<String> {
    if field.contains(['\n', '\r']) {
        bail!("row {}: field {:?} contains a line break", row, field);
    }
    if field.contains([',', '"']) {
        Ok(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Ok(field.to_string())
    }
}

fn transaction_fields(tx: &Transaction, row: usize) -> Result<[String; 4]> {
    Ok([
        quote(&tx.user_id, row)?,
        tx.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        quote(&tx.merchant, row)?,
        tx.amount.to_string(),
    ])
}

pub fn format_row(r: &AnnotatedTransaction, row: usize) -> Result<String> {
    let [user, ts, merchant, amount] = transaction_fields(&r.transaction, row)?;
    Ok([user, ts, merchant, amount, quote(&format_rules(&r.triggered_rules), row)?].join(","))
}

/// Write every result row (flagged or not) with the triage columns.
pub fn write_csv<W: Write>(mut out: W, results: &[AnnotatedTransaction]) -> Result<()> {
    writeln!(out, "{}", OUTPUT_COLUMNS.join(","))?;
    for (i, r) in results.iter().enumerate() {
        writeln!(out, "{}", format_row(r, i)?)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_csv_file(path: &Path, results: &[AnnotatedTransaction]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_csv(BufWriter::new(file), results)?;
    log_sink("csv", &path.display().to_string(), results.len());
    Ok(())
}

/// Write raw transactions in the loader's input layout.
pub fn write_transactions_csv<W: Write>(mut out: W, txs: &[Transaction]) -> Result<()> {
    writeln!(out, "{}", EXPECTED_COLUMNS.join(","))?;
    for (i, tx) in txs.iter().enumerate() {
        writeln!(out, "{}", transaction_fields(tx, i)?.join(","))?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_transactions_file(path: &Path, txs: &[Transaction]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_transactions_csv(BufWriter::new(file), txs)?;
    log_sink("csv", &path.display().to_string(), txs.len());
    Ok(())
}

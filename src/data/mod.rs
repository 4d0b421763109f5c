//! Transaction log loading, schema checks and dataset manifests.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::log_load;
use crate::transaction::Transaction;

/// Canonical header, as written by the generator and read back by the loader.
pub const EXPECTED_COLUMNS: [&str; 4] = ["user ID", "timestamp", "merchant name", "amount"];

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

const BOM: char = '\u{feff}';

#[derive(Debug, Error, PartialEq)]
pub enum InputFormatError {
    #[error("missing header row")]
    MissingHeader,
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("line {line}: expected {expected} fields, got {got}")]
    FieldCount { line: usize, expected: usize, got: usize },
    #[error("line {line}: bad timestamp '{value}'")]
    Timestamp { line: usize, value: String },
    #[error("line {line}: bad amount '{value}'")]
    Amount { line: usize, value: String },
    #[error("line {line}: negative amount {value}")]
    NegativeAmount { line: usize, value: f64 },
    #[error("line {line}: empty {field}")]
    EmptyField { line: usize, field: &'static str },
    #[error("line {line}: unterminated quoted field")]
    Unterminated { line: usize },
}

/// Positions of the required columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    user_id: usize,
    timestamp: usize,
    merchant: usize,
    amount: usize,
    width: usize,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Result<Self, InputFormatError> {
        let user_id = find_column(header, &["user ID", "user_id"], "user ID")?;
        let timestamp = find_column(header, &["timestamp", "ts"], "timestamp")?;
        let merchant = find_column(header, &["merchant name", "merchant"], "merchant name")?;
        let amount = find_column(header, &["amount"], "amount")?;
        let width = 1 + user_id.max(timestamp).max(merchant).max(amount);
        Ok(Self { user_id, timestamp, merchant, amount, width })
    }
}

fn find_column(header: &[String], names: &[&str], canonical: &'static str) -> Result<usize, InputFormatError> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        .ok_or(InputFormatError::MissingColumn(canonical))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub columns: Vec<String>,
    pub expected: Vec<String>,
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub user_count: u64,
    pub merchant_count: u64,
    pub ts_min: Option<NaiveDateTime>,
    pub ts_max: Option<NaiveDateTime>,
    pub columns: Vec<String>,
    pub generated_at: String,
}

/// Split one CSV line. Double-quoted fields may contain commas; `""` inside
/// quotes is a literal quote.
pub fn split_csv_line(line: &str, line_no: usize) -> Result<Vec<String>, InputFormatError> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    if in_quotes {
        return Err(InputFormatError::Unterminated { line: line_no });
    }
    fields.push(cur);
    Ok(fields)
}

/// Parse naive `YYYY-MM-DD HH:MM[:SS[.f]]` (space or `T` separated), a bare
/// `YYYY-MM-DD` (midnight), or RFC 3339 with an offset, which is normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_amount(raw: &str, line: usize) -> Result<f64, InputFormatError> {
    let value: f64 = raw.trim().parse().map_err(|_| InputFormatError::Amount {
        line,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(InputFormatError::Amount { line, value: raw.to_string() });
    }
    if value < 0.0 {
        return Err(InputFormatError::NegativeAmount { line, value });
    }
    Ok(value)
}

fn parse_row(fields: &[String], cols: ColumnMap, line: usize) -> Result<Transaction, InputFormatError> {
    if fields.len() < cols.width {
        return Err(InputFormatError::FieldCount {
            line,
            expected: cols.width,
            got: fields.len(),
        });
    }
    let user_id = fields[cols.user_id].trim();
    if user_id.is_empty() {
        return Err(InputFormatError::EmptyField { line, field: "user ID" });
    }
    let raw_ts = &fields[cols.timestamp];
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| InputFormatError::Timestamp {
        line,
        value: raw_ts.to_string(),
    })?;
    Ok(Transaction {
        user_id: user_id.to_string(),
        timestamp,
        merchant: fields[cols.merchant].trim().to_string(),
        amount: parse_amount(&fields[cols.amount], line)?,
    })
}

fn is_skippable(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Header line with any leading byte-order mark removed.
fn header_text(trimmed: &str) -> &str {
    trimmed.trim_start_matches(BOM).trim_start()
}

/// Parse a whole transaction log from any reader. Line numbers in errors are 1-based.
pub fn parse_transactions<R: BufRead>(reader: R) -> Result<Vec<Transaction>> {
    let mut cols: Option<ColumnMap> = None;
    let mut txs = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.with_context(|| format!("reading line {}", line_no))?;
        let mut trimmed = line.trim();
        if cols.is_none() {
            trimmed = header_text(trimmed);
        }
        if is_skippable(trimmed) {
            continue;
        }
        let fields = split_csv_line(trimmed, line_no)?;
        match cols {
            None => cols = Some(ColumnMap::from_header(&fields)?),
            Some(map) => txs.push(parse_row(&fields, map, line_no)?),
        }
    }
    if cols.is_none() {
        return Err(InputFormatError::MissingHeader.into());
    }
    Ok(txs)
}

pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let txs = parse_transactions(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    let users: HashSet<&str> = txs.iter().map(|t| t.user_id.as_str()).collect();
    log_load(&path.display().to_string(), txs.len(), users.len());
    Ok(txs)
}

pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = header_text(line.trim());
        if is_skippable(trimmed) {
            continue;
        }
        return Ok(split_csv_line(trimmed, i + 1)?
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect());
    }
    Ok(Vec::new())
}

/// Check the header without loading rows. Accepts any header the loader can map.
pub fn validate_schema(path: &Path) -> Result<SchemaReport> {
    let header = read_header(path)?;
    let expected = EXPECTED_COLUMNS.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let (ok, message) = if header.is_empty() {
        (false, InputFormatError::MissingHeader.to_string())
    } else {
        match ColumnMap::from_header(&header) {
            Ok(_) => (true, "schema ok".to_string()),
            Err(err) => (false, format!("schema mismatch: {} (got {:?})", err, header)),
        }
    };
    Ok(SchemaReport { columns: header, expected, ok, message })
}

pub fn describe_dataset(path: &Path, txs: &[Transaction]) -> Result<DatasetManifest> {
    let users: HashSet<&str> = txs.iter().map(|t| t.user_id.as_str()).collect();
    let merchants: HashSet<&str> = txs.iter().map(|t| t.merchant.as_str()).collect();
    Ok(DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: file_sha256(path)?,
        row_count: txs.len() as u64,
        user_count: users.len() as u64,
        merchant_count: merchants.len() as u64,
        ts_min: txs.iter().map(|t| t.timestamp).min(),
        ts_max: txs.iter().map(|t| t.timestamp).max(),
        columns: read_header(path)?,
        generated_at: crate::logging::ts_now(),
    })
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("transactions.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

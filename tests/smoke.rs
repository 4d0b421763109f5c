//! End-to-end: synthetic batch on disk -> loader -> rules -> CSV and SQLite sinks.

use std::fs;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use txflag::data::{describe_dataset, load_transactions, validate_schema, EXPECTED_COLUMNS};
use txflag::generate::{generate_transactions, GeneratorConfig};
use txflag::sink::{write_csv_file, write_transactions_file};
use txflag::storage::ResultStore;
use txflag::verify::invariants::assert_output_invariants;
use txflag::{evaluate_with_summary, DetectionConfig, Rule};

fn reference() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 10, 18)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[test]
fn synthetic_batch_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("transactions.csv");
    let output = dir.path().join("suspicious_transactions.csv");

    let generated = generate_transactions(&GeneratorConfig::new(1000, reference()));
    write_transactions_file(&input, &generated).unwrap();

    assert!(validate_schema(&input).unwrap().ok);
    let txs = load_transactions(&input).unwrap();
    assert_eq!(txs.len(), 1000);
    assert_eq!(txs[10].timestamp, generated[10].timestamp);

    let (results, summary) = evaluate_with_summary(&txs, &DetectionConfig::default());
    assert_output_invariants(&txs, &results).unwrap();
    assert_eq!(summary.total, 1000);

    // planted large amounts
    assert!(results[..=10].iter().all(|r| r.flags.rule1));
    // planted one-minute burst
    assert!(results[10..=20].iter().all(|r| r.flags.rule3));
    // planted same-merchant run
    assert!(results[21..=30].iter().all(|r| r.flags.rule4));
    assert!(summary.count(Rule::LargeAmount) >= 11);
    assert!(summary.count(Rule::BurstActivity) >= 11);

    write_csv_file(&output, &results).unwrap();
    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    // every transaction is written, not only flagged ones
    assert_eq!(lines.len(), 1001);
    assert_eq!(lines[0], "user ID,timestamp,merchant name,amount,triggered_rules");
    assert!(lines[1].contains(",[1]") || lines[1].contains(",\"[1, "));

    let mut store = ResultStore::in_memory().unwrap();
    store.init().unwrap();
    store.persist_run("smoke", &results).unwrap();
    assert_eq!(store.count_rows("smoke").unwrap(), 1000);
    assert_eq!(store.count_suspicious("smoke").unwrap(), summary.suspicious as u64);
}

#[test]
fn manifest_describes_loaded_batch() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("batch.csv");
    let generated = generate_transactions(&GeneratorConfig::new(60, reference()));
    write_transactions_file(&input, &generated).unwrap();

    let txs = load_transactions(&input).unwrap();
    let manifest = describe_dataset(&input, &txs).unwrap();
    assert_eq!(manifest.row_count, 60);
    assert_eq!(manifest.hash_sha256.len(), 64);
    assert!(manifest.user_count >= 1 && manifest.user_count <= 60);
    assert!(manifest.merchant_count <= 7);
    assert!(manifest.ts_min <= manifest.ts_max);
    assert_eq!(manifest.columns, EXPECTED_COLUMNS.to_vec());
}

#[test]
fn malformed_input_is_rejected_before_evaluation() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.csv");
    fs::write(
        &input,
        "user ID,timestamp,merchant name,amount\n1,2024-10-18 00:00:00,Store A,10\n2,not-a-time,Store B,10\n",
    )
    .unwrap();
    let err = load_transactions(&input).unwrap_err();
    let format_err = err.downcast_ref::<txflag::data::InputFormatError>().unwrap();
    assert!(matches!(
        format_err,
        txflag::data::InputFormatError::Timestamp { line: 3, .. }
    ));
}

#[test]
fn schema_rejects_missing_columns() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("partial.csv");
    fs::write(&input, "user ID,amount\n1,10\n").unwrap();
    let report = validate_schema(&input).unwrap();
    assert!(!report.ok);
}

#[test]
fn minute_timestamps_and_bom_header_load() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("export.csv");
    fs::write(
        &input,
        "\u{feff}user ID,timestamp,merchant name,amount\n1,2024-10-18 10:05,Store A,5\n1,2024-10-18,Store B,7\n",
    )
    .unwrap();
    assert!(validate_schema(&input).unwrap().ok);
    let txs = load_transactions(&input).unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].timestamp, reference() + chrono::Duration::minutes(605));
    assert_eq!(txs[1].timestamp, reference());
}

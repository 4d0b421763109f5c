use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use txflag::data::{load_transactions, validate_schema};
use txflag::logging::{self, log, obj, v_str, Domain, Level};
use txflag::sink::write_csv_file;
use txflag::storage::ResultStore;
use txflag::verify::invariants::assert_output_invariants;
use txflag::{evaluate_with_summary, DetectionConfig};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().unwrap_or_else(|| "transactions.csv".to_string()));
    let output = PathBuf::from(args.next().unwrap_or_else(|| "suspicious_transactions.csv".to_string()));
    let cfg = DetectionConfig::from_env();

    log(
        Level::Info,
        Domain::System,
        "start",
        obj(&[
            ("input", v_str(&input.display().to_string())),
            ("output", v_str(&output.display().to_string())),
            ("config", json!(cfg)),
        ]),
    );

    let schema = validate_schema(&input)?;
    if !schema.ok {
        return Err(anyhow!("{}: {}", input.display(), schema.message));
    }

    let txs = load_transactions(&input)?;
    let (results, summary) = evaluate_with_summary(&txs, &cfg);
    assert_output_invariants(&txs, &results)
        .map_err(|v| anyhow!("output invariant violated at row {:?}: {}", v.row, v.msg))?;

    write_csv_file(&output, &results)?;

    if let Ok(db_path) = std::env::var("TXFLAG_SQLITE") {
        let run_id = logging::run_id();
        let mut store = ResultStore::new(&db_path).with_context(|| format!("opening {}", db_path))?;
        store.init()?;
        store.persist_run(&run_id, &results)?;
        logging::log_sink("sqlite", &db_path, results.len());
    }

    log(
        Level::Info,
        Domain::System,
        "done",
        obj(&[("summary", json!(summary))]),
    );
    logging::flush();
    Ok(())
}

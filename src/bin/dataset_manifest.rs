use std::env;
use std::fs;
use std::path::PathBuf;

use txflag::data::{default_manifest_path, describe_dataset, load_transactions, validate_schema, EXPECTED_COLUMNS};

fn main() {
    let path = PathBuf::from(env::args().nth(1).unwrap_or_else(|| "transactions.csv".to_string()));

    let schema = match validate_schema(&path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("schema check failed: {:#}", err);
            std::process::exit(1);
        }
    };

    if !schema.ok {
        eprintln!("schema mismatch: {:?}", schema.message);
        eprintln!("expected columns: {:?}", EXPECTED_COLUMNS);
        std::process::exit(2);
    }

    let manifest = match load_transactions(&path).and_then(|txs| describe_dataset(&path, &txs)) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("analysis failed: {:#}", err);
            std::process::exit(3);
        }
    };

    let out_path = default_manifest_path(&path);
    let payload = match serde_json::to_string_pretty(&manifest) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("failed to encode manifest: {}", err);
            std::process::exit(4);
        }
    };
    if let Err(err) = fs::write(&out_path, payload) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!("wrote manifest {}", out_path.display());
}

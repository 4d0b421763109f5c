use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use txflag::generate::{generate_transactions, GeneratorConfig};
use txflag::logging;
use txflag::sink::write_transactions_file;

fn main() -> Result<()> {
    let rows = std::env::args()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);
    let path = std::env::args().nth(2).unwrap_or_else(|| "transactions.csv".to_string());

    let mut cfg = GeneratorConfig::new(rows, Utc::now().naive_utc());
    if let Some(seed) = std::env::var("GEN_SEED").ok().and_then(|v| v.parse().ok()) {
        cfg.seed = seed;
    }
    let txs = generate_transactions(&cfg);

    write_transactions_file(Path::new(&path), &txs)?;
    logging::flush();
    Ok(())
}

//! Seeded synthetic batches for demos and soak tests.
//!
//! Background traffic is random; a handful of index ranges are overwritten
//! with patterns each rule should catch (inclusive ranges, skipped when the
//! batch is shorter).

use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::transaction::Transaction;

pub const MERCHANTS: [&str; 7] = ["Store A", "Store B", "Store C", "Store D", "Store E", "Store F", "Store G"];

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub rows: usize,
    pub seed: u64,
    pub users: u64,
    pub mean_amount: f64,
    /// Timestamps fall within the 24h before this instant.
    pub reference: NaiveDateTime,
}

impl GeneratorConfig {
    pub fn new(rows: usize, reference: NaiveDateTime) -> Self {
        Self {
            rows,
            seed: 42,
            users: 100,
            mean_amount: 100.0,
            reference,
        }
    }
}

fn exponential(rng: &mut StdRng, mean: f64) -> f64 {
    let u: f64 = rng.gen();
    let x = -mean * (1.0 - u).ln();
    (x * 100.0).round() / 100.0
}

fn rows_in(len: usize, first: usize, last: usize) -> std::ops::Range<usize> {
    first.min(len)..(last + 1).min(len)
}

pub fn generate_transactions(cfg: &GeneratorConfig) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let users = cfg.users.max(1);
    let mut txs: Vec<Transaction> = (0..cfg.rows)
        .map(|_| {
            let user = rng.gen_range(1..=users);
            let minutes_ago = rng.gen_range(1..1440);
            let merchant = MERCHANTS[rng.gen_range(0..MERCHANTS.len())];
            Transaction::new(
                user.to_string(),
                cfg.reference - Duration::minutes(minutes_ago),
                merchant,
                exponential(&mut rng, cfg.mean_amount),
            )
        })
        .collect();
    let n = txs.len();

    // rule 1
    for i in rows_in(n, 0, 10) {
        txs[i].amount = 15_000.0;
    }
    // rule 3: row 10's user, one-minute spacing
    if let Some((user, base)) = txs.get(10).map(|t| (t.user_id.clone(), t.timestamp)) {
        for (step, i) in rows_in(n, 10, 20).enumerate() {
            txs[i].user_id = user.clone();
            txs[i].timestamp = base + Duration::minutes(step as i64);
        }
    }
    // rule 4: row 21's user at one merchant, five-minute spacing
    if let Some((user, base)) = txs.get(21).map(|t| (t.user_id.clone(), t.timestamp)) {
        for (step, i) in rows_in(n, 21, 30).enumerate() {
            txs[i].user_id = user.clone();
            txs[i].merchant = MERCHANTS[0].to_string();
            txs[i].timestamp = base + Duration::minutes(5 * step as i64);
        }
    }
    // rule 2
    for i in rows_in(n, 30, 40) {
        txs[i].amount *= 10.0;
    }
    // rule 5
    for (step, i) in rows_in(n, 40, 50).enumerate() {
        txs[i].amount = 100.0 * (step + 1) as f64;
    }
    txs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 18)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_deterministic_for_seed() {
        let cfg = GeneratorConfig::new(200, reference());
        assert_eq!(generate_transactions(&cfg), generate_transactions(&cfg));
    }

    #[test]
    fn test_planted_patterns() {
        let txs = generate_transactions(&GeneratorConfig::new(1000, reference()));
        assert_eq!(txs.len(), 1000);
        assert!(txs[..=10].iter().all(|t| t.amount == 15_000.0));
        for i in 11..=20 {
            assert_eq!(txs[i].timestamp - txs[i - 1].timestamp, Duration::minutes(1));
        }
        assert!(txs[10..=20].iter().all(|t| t.user_id == txs[10].user_id));
        assert!(txs[21..=30].iter().all(|t| t.merchant == "Store A" && t.user_id == txs[21].user_id));
        assert_eq!(txs[40].amount, 100.0);
        assert_eq!(txs[50].amount, 1100.0);
        assert!(txs.iter().all(|t| t.amount >= 0.0));
    }

    #[test]
    fn test_short_batches() {
        assert!(generate_transactions(&GeneratorConfig::new(0, reference())).is_empty());
        let txs = generate_transactions(&GeneratorConfig::new(15, reference()));
        assert_eq!(txs.len(), 15);
        assert_eq!(txs[14].timestamp - txs[10].timestamp, Duration::minutes(4));
    }
}

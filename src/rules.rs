//! Threshold rules (1, 2 and 5).
//!
//! Rules 2 and 5 compare each amount against the mean of *all* of that user's
//! transactions, including the one under test. A large outlier therefore
//! raises its own baseline; this matches the established behaviour of the
//! triage reports and is kept deliberately.

use std::collections::HashMap;

use crate::config::DetectionConfig;
use crate::transaction::Transaction;

/// Per-user mean amount, computed once per run and shared by rules 2 and 5.
#[derive(Debug, Clone, Default)]
pub struct UserMeans {
    means: HashMap<String, f64>,
}

impl UserMeans {
    pub fn compute(txs: &[Transaction]) -> Self {
        let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
        for tx in txs {
            let entry = acc.entry(tx.user_id.as_str()).or_insert((0.0, 0));
            entry.0 += tx.amount;
            entry.1 += 1;
        }
        let means = acc
            .into_iter()
            .map(|(user, (sum, n))| (user.to_string(), sum / n as f64))
            .collect();
        Self { means }
    }

    /// Mean for a user. Users come from the data, so every user seen by
    /// `compute` has at least one transaction.
    pub fn get(&self, user_id: &str) -> Option<f64> {
        self.means.get(user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

/// Rule 1: amount strictly above the configured threshold.
pub fn large_amount(tx: &Transaction, threshold: f64) -> bool {
    tx.amount > threshold
}

/// Rule 2: amount strictly above `multiplier` times the user's mean.
pub fn unusually_high(tx: &Transaction, means: &UserMeans, multiplier: f64) -> bool {
    means
        .get(&tx.user_id)
        .map(|mean| tx.amount > multiplier * mean)
        .unwrap_or(false)
}

/// Rule 5: exact multiple of `unit` and strictly above `multiplier` times the user's mean.
pub fn round_amount(tx: &Transaction, means: &UserMeans, unit: f64, multiplier: f64) -> bool {
    if unit <= 0.0 || tx.amount % unit != 0.0 {
        return false;
    }
    means
        .get(&tx.user_id)
        .map(|mean| tx.amount > multiplier * mean)
        .unwrap_or(false)
}

/// Column of rule 1 flags, aligned with `txs`.
pub fn rule_large_amount(txs: &[Transaction], cfg: &DetectionConfig) -> Vec<bool> {
    txs.iter()
        .map(|tx| large_amount(tx, cfg.large_amount_threshold))
        .collect()
}

pub fn rule_unusually_high(txs: &[Transaction], means: &UserMeans, cfg: &DetectionConfig) -> Vec<bool> {
    txs.iter()
        .map(|tx| unusually_high(tx, means, cfg.high_multiplier))
        .collect()
}

pub fn rule_round_amount(txs: &[Transaction], means: &UserMeans, cfg: &DetectionConfig) -> Vec<bool> {
    txs.iter()
        .map(|tx| round_amount(tx, means, cfg.round_unit, cfg.round_multiplier))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tx(user: &str, amount: f64) -> Transaction {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Transaction::new(user, ts, "Store A", amount)
    }

    #[test]
    fn test_large_amount_is_strict() {
        assert!(!large_amount(&tx("1", 10_000.0), 10_000.0));
        assert!(large_amount(&tx("1", 10_000.01), 10_000.0));
        assert!(!large_amount(&tx("1", 0.0), 10_000.0));
    }

    #[test]
    fn test_user_means() {
        let txs = vec![tx("a", 10.0), tx("a", 30.0), tx("b", 7.0)];
        let means = UserMeans::compute(&txs);
        assert_eq!(means.len(), 2);
        assert_eq!(means.get("a"), Some(20.0));
        assert_eq!(means.get("b"), Some(7.0));
        assert_eq!(means.get("c"), None);
    }

    #[test]
    fn test_empty_input_empty_means() {
        let means = UserMeans::compute(&[]);
        assert!(means.is_empty());
        assert!(rule_large_amount(&[], &DetectionConfig::default()).is_empty());
    }

    #[test]
    fn test_unusually_high_uses_self_inclusive_mean() {
        // mean = (10 * 9 + 1000) / 10 = 109; 1000 > 5 * 109
        let mut txs: Vec<Transaction> = (0..9).map(|_| tx("u", 10.0)).collect();
        txs.push(tx("u", 1000.0));
        let means = UserMeans::compute(&txs);
        let flags = rule_unusually_high(&txs, &means, &DetectionConfig::default());
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        assert!(flags[9]);

        // With only two rows the outlier dominates its own mean: 1000 > 5 * 505 is false
        let pair = vec![tx("v", 10.0), tx("v", 1000.0)];
        let means = UserMeans::compute(&pair);
        assert!(!unusually_high(&pair[1], &means, 5.0));
    }

    #[test]
    fn test_single_transaction_against_own_mean() {
        let txs = vec![tx("solo", 250.0)];
        let means = UserMeans::compute(&txs);
        assert!(!unusually_high(&txs[0], &means, 5.0));
        assert!(!unusually_high(&txs[0], &means, 1.0));
        assert!(unusually_high(&txs[0], &means, 0.99));
    }

    #[test]
    fn test_round_amount_requires_multiple_and_ratio() {
        let mut txs: Vec<Transaction> = (0..30).map(|_| tx("r", 10.0)).collect();
        txs.push(tx("r", 5_000.0));
        txs.push(tx("r", 5_050.0));
        let means = UserMeans::compute(&txs);
        // mean = (300 + 10050) / 32 ≈ 323.4; 10x ≈ 3234
        assert!(round_amount(&txs[30], &means, 100.0, 10.0));
        assert!(!round_amount(&txs[31], &means, 100.0, 10.0));
        assert!(!round_amount(&txs[0], &means, 100.0, 10.0));
    }

    #[test]
    fn test_round_amount_non_positive_unit_never_fires() {
        let txs = vec![tx("z", 0.0), tx("z", 500.0)];
        let means = UserMeans::compute(&txs);
        assert!(!round_amount(&txs[1], &means, 0.0, 0.0));
    }
}

//! Full rule pass over a batch: user means, five rule columns, aggregation.

use crate::aggregate::{aggregate, RuleColumns, RunSummary};
use crate::config::DetectionConfig;
use crate::logging::{log_run_summary, log_user_means, ProfileScope};
use crate::rules::{rule_large_amount, rule_round_amount, rule_unusually_high, UserMeans};
use crate::transaction::{AnnotatedTransaction, Transaction};
use crate::window::{rule_burst_activity, rule_frequent_merchant};

/// Evaluate all five rules. Output has one entry per input transaction, in input order.
pub fn evaluate(txs: &[Transaction], cfg: &DetectionConfig) -> Vec<AnnotatedTransaction> {
    let _scope = ProfileScope::with_context("evaluate", &[("rows", serde_json::json!(txs.len()))]);

    let means = UserMeans::compute(txs);
    log_user_means(means.len());

    let columns = RuleColumns {
        rule1: rule_large_amount(txs, cfg),
        rule2: rule_unusually_high(txs, &means, cfg),
        rule3: rule_burst_activity(txs, cfg),
        rule4: rule_frequent_merchant(txs, cfg),
        rule5: rule_round_amount(txs, &means, cfg),
    };
    aggregate(txs, &columns)
}

/// `evaluate` plus a logged per-rule summary.
pub fn evaluate_with_summary(txs: &[Transaction], cfg: &DetectionConfig) -> (Vec<AnnotatedTransaction>, RunSummary) {
    let results = evaluate(txs, cfg);
    let summary = RunSummary::from_results(&results);
    log_run_summary(summary.total, summary.suspicious, &summary.rule_counts());
    (results, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_batch() {
        let (results, summary) = evaluate_with_summary(&[], &DetectionConfig::default());
        assert!(results.is_empty());
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn test_combined_rules() {
        let cfg = DetectionConfig::single_threaded();
        let mut txs: Vec<Transaction> = (0..20)
            .map(|i| Transaction::new("1", t0() + Duration::hours(i * 3), format!("Store {}", i % 4), 50.0))
            .collect();
        // large, round, far above the user's mean, isolated in time
        txs.push(Transaction::new("1", t0() + Duration::days(10), "Store Z", 20_000.0));
        let results = evaluate(&txs, &cfg);
        assert_eq!(results.len(), 21);
        // mean = (20 * 50 + 20000) / 21 = 1000; 20000 > 5000 and > 10000
        assert_eq!(results[20].triggered_rules, vec![1, 2, 5]);
        assert!(results[..20].iter().all(|r| !r.suspicious));
    }

    #[test]
    fn test_idempotent() {
        let cfg = DetectionConfig::default();
        let txs: Vec<Transaction> = (0..50)
            .map(|i| Transaction::new(format!("{}", i % 5), t0() + Duration::minutes(i), "Store A", (i * 37 % 900) as f64))
            .collect();
        let a: Vec<Vec<u8>> = evaluate(&txs, &cfg).into_iter().map(|r| r.triggered_rules).collect();
        let b: Vec<Vec<u8>> = evaluate(&txs, &cfg).into_iter().map(|r| r.triggered_rules).collect();
        assert_eq!(a, b);
    }
}

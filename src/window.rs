//! Sliding time-window scanner behind rules 3 and 4.
//!
//! Records are partitioned by a key, each partition is sorted by timestamp, and
//! every record inside some window `[ts_anchor, ts_anchor + T]` (both ends
//! inclusive) holding at least `min_count` records of the partition is flagged.
//! Each partition scan is a pure function returning flagged input indices;
//! results are merged by union so partitions can be scanned on any thread.

use std::collections::HashMap;
use std::hash::Hash;
use std::thread;

use chrono::{Duration, NaiveDateTime};

use crate::config::DetectionConfig;
use crate::logging::{log_scan, ProfileScope};
use crate::transaction::{Rule, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub min_count: usize,
    pub window_minutes: u64,
}

impl WindowParams {
    pub fn new(min_count: usize, window_minutes: u64) -> Self {
        Self { min_count, window_minutes }
    }

    /// Inclusive end of the window anchored at `start`. `None` means the
    /// window reaches past the representable range and is unbounded.
    fn window_end(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        i64::try_from(self.window_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .and_then(|span| start.checked_add_signed(span))
    }
}

/// Group input indices by key. Partitions are ordered by first appearance and
/// each index list is ascending (input order).
pub fn partition_by<'a, K, F>(txs: &'a [Transaction], key: F) -> Vec<Vec<usize>>
where
    K: Eq + Hash,
    F: Fn(&'a Transaction) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut parts: Vec<Vec<usize>> = Vec::new();
    for (idx, tx) in txs.iter().enumerate() {
        let slot = *slots.entry(key(tx)).or_insert_with(|| {
            parts.push(Vec::new());
            parts.len() - 1
        });
        parts[slot].push(idx);
    }
    parts
}

/// Scan one partition and return the input indices that fall in a qualifying window.
///
/// Two pointers walk the time-sorted partition: `lo` is the first record
/// sharing the anchor's timestamp (equal timestamps are inside each other's
/// windows), `hi` is one past the last record at or before the window end.
/// Both only move forward, so after the sort the scan is linear.
pub fn scan_partition(txs: &[Transaction], indices: &[usize], params: WindowParams) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    // stable: equal timestamps keep input order
    sorted.sort_by_key(|&i| txs[i].timestamp);

    let ts: Vec<NaiveDateTime> = sorted.iter().map(|&i| txs[i].timestamp).collect();
    let k = ts.len();
    let mut flagged = Vec::new();
    let mut lo = 0usize;
    let mut hi = 0usize;
    let mut marked_end = 0usize;

    for anchor in 0..k {
        if anchor > 0 && ts[anchor] != ts[anchor - 1] {
            lo = anchor;
        }
        let end = params.window_end(ts[anchor]);
        while hi < k && end.map_or(true, |e| ts[hi] <= e) {
            hi += 1;
        }
        if hi - lo >= params.min_count {
            for pos in marked_end.max(lo)..hi {
                flagged.push(sorted[pos]);
            }
            marked_end = marked_end.max(hi);
        }
    }
    flagged
}

/// Scan every partition and merge the results into one flag per input record.
pub fn scan(txs: &[Transaction], partitions: &[Vec<usize>], params: WindowParams, workers: usize) -> Vec<bool> {
    let mut flags = vec![false; txs.len()];
    if workers <= 1 || partitions.len() < 2 {
        for part in partitions {
            for idx in scan_partition(txs, part, params) {
                flags[idx] = true;
            }
        }
        return flags;
    }

    let chunk = partitions.len().div_ceil(workers);
    let results: Vec<Vec<usize>> = thread::scope(|s| {
        let handles: Vec<_> = partitions
            .chunks(chunk)
            .map(|group| {
                s.spawn(move || {
                    group
                        .iter()
                        .flat_map(|part| scan_partition(txs, part, params))
                        .collect::<Vec<usize>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    for idx in results.into_iter().flatten() {
        flags[idx] = true;
    }
    flags
}

fn scan_rule(txs: &[Transaction], rule: Rule, partitions: Vec<Vec<usize>>, params: WindowParams, workers: usize) -> Vec<bool> {
    let _scope = ProfileScope::with_context(
        "window_scan",
        &[("rule", serde_json::json!(rule.number()))],
    );
    let flags = scan(txs, &partitions, params, workers);
    log_scan(
        rule,
        partitions.len(),
        flags.iter().filter(|f| **f).count(),
        params.min_count,
        params.window_minutes,
    );
    flags
}

/// Rule 3: at least `burst_count` transactions by one user within `burst_window_minutes`.
pub fn rule_burst_activity(txs: &[Transaction], cfg: &DetectionConfig) -> Vec<bool> {
    let partitions = partition_by(txs, |tx| tx.user_id.as_str());
    let params = WindowParams::new(cfg.burst_count, cfg.burst_window_minutes);
    scan_rule(txs, Rule::BurstActivity, partitions, params, cfg.workers)
}

/// Rule 4: at least `merchant_count` transactions by one user to one merchant
/// within `merchant_window_minutes`.
pub fn rule_frequent_merchant(txs: &[Transaction], cfg: &DetectionConfig) -> Vec<bool> {
    let partitions = partition_by(txs, |tx| (tx.user_id.as_str(), tx.merchant.as_str()));
    let params = WindowParams::new(cfg.merchant_count, cfg.merchant_window_minutes);
    scan_rule(txs, Rule::FrequentMerchant, partitions, params, cfg.workers)
}

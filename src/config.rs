use serde::{Deserialize, Serialize};

/// Rule thresholds and scanner parameters for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Rule 1: flag amounts strictly above this value.
    pub large_amount_threshold: f64,
    /// Rule 2: flag amounts strictly above `high_multiplier * user_mean`.
    pub high_multiplier: f64,
    /// Rule 3: minimum transactions per user inside one burst window.
    pub burst_count: usize,
    pub burst_window_minutes: u64,
    /// Rule 4: minimum transactions per (user, merchant) inside one window.
    pub merchant_count: usize,
    pub merchant_window_minutes: u64,
    /// Rule 5: amounts must be an exact multiple of this unit...
    pub round_unit: f64,
    /// ...and strictly above `round_multiplier * user_mean`.
    pub round_multiplier: f64,
    /// Threads used by the window scanner; 1 scans inline.
    pub workers: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            large_amount_threshold: 10_000.0,
            high_multiplier: 5.0,
            burst_count: 3,
            burst_window_minutes: 5,
            merchant_count: 3,
            merchant_window_minutes: 60,
            round_unit: 100.0,
            round_multiplier: 10.0,
            workers: num_cpus::get().min(8),
        }
    }
}

impl DetectionConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            large_amount_threshold: std::env::var("TXFLAG_LARGE_AMOUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.large_amount_threshold),
            high_multiplier: std::env::var("TXFLAG_HIGH_MULT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.high_multiplier),
            burst_count: std::env::var("TXFLAG_BURST_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.burst_count),
            burst_window_minutes: std::env::var("TXFLAG_BURST_WINDOW_MIN").ok().and_then(|v| v.parse().ok()).unwrap_or(d.burst_window_minutes),
            merchant_count: std::env::var("TXFLAG_MERCHANT_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.merchant_count),
            merchant_window_minutes: std::env::var("TXFLAG_MERCHANT_WINDOW_MIN").ok().and_then(|v| v.parse().ok()).unwrap_or(d.merchant_window_minutes),
            round_unit: std::env::var("TXFLAG_ROUND_UNIT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.round_unit),
            round_multiplier: std::env::var("TXFLAG_ROUND_MULT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.round_multiplier),
            workers: std::env::var("TXFLAG_WORKERS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.workers).max(1),
        }
    }

    /// Sequential config, handy for tests and small batches.
    pub fn single_threaded() -> Self {
        Self { workers: 1, ..Self::default() }
    }
}

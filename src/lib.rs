pub mod aggregate;
pub mod config;
pub mod data;
pub mod detector;
pub mod generate;
pub mod logging;
pub mod rules;
pub mod sink;
pub mod storage;
pub mod transaction;
pub mod verify;
pub mod window;

pub use config::DetectionConfig;
pub use detector::{evaluate, evaluate_with_summary};
pub use transaction::{AnnotatedTransaction, Rule, RuleFlagSet, Transaction};

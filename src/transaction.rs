use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Number of heuristic rules evaluated per transaction.
pub const RULE_COUNT: usize = 5;

/// One row of the batch log. Never mutated after loading; derived flags are
/// associated with a transaction by its index in the input slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub merchant: String,
    pub amount: f64,
}

impl Transaction {
    pub fn new(user_id: impl Into<String>, timestamp: NaiveDateTime, merchant: impl Into<String>, amount: f64) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
            merchant: merchant.into(),
            amount,
        }
    }
}

/// Rule identifiers, numbered the way they are reported in `triggered_rules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    LargeAmount = 1,
    UnusuallyHigh = 2,
    BurstActivity = 3,
    FrequentMerchant = 4,
    RoundAmount = 5,
}

impl Rule {
    pub const ALL: [Rule; RULE_COUNT] = [
        Rule::LargeAmount,
        Rule::UnusuallyHigh,
        Rule::BurstActivity,
        Rule::FrequentMerchant,
        Rule::RoundAmount,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rule::LargeAmount => "large_amount",
            Rule::UnusuallyHigh => "unusually_high",
            Rule::BurstActivity => "burst_activity",
            Rule::FrequentMerchant => "frequent_merchant",
            Rule::RoundAmount => "round_amount",
        }
    }
}

/// Per-transaction outcome of the five rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFlagSet {
    pub rule1: bool,
    pub rule2: bool,
    pub rule3: bool,
    pub rule4: bool,
    pub rule5: bool,
}

impl RuleFlagSet {
    pub fn flags(&self) -> [bool; RULE_COUNT] {
        [self.rule1, self.rule2, self.rule3, self.rule4, self.rule5]
    }

    pub fn get(&self, rule: Rule) -> bool {
        self.flags()[rule.number() as usize - 1]
    }

    pub fn suspicious(&self) -> bool {
        self.flags().iter().any(|f| *f)
    }

    /// 1-based numbers of the rules that fired, ascending.
    pub fn triggered_rules(&self) -> Vec<u8> {
        Rule::ALL
            .iter()
            .filter(|r| self.get(**r))
            .map(|r| r.number())
            .collect()
    }
}

/// A transaction together with its rule outcome. The engine emits one per
/// input transaction, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedTransaction {
    pub transaction: Transaction,
    pub flags: RuleFlagSet,
    pub suspicious: bool,
    pub triggered_rules: Vec<u8>,
}

impl AnnotatedTransaction {
    pub fn new(transaction: Transaction, flags: RuleFlagSet) -> Self {
        Self {
            suspicious: flags.suspicious(),
            triggered_rules: flags.triggered_rules(),
            transaction,
            flags,
        }
    }
}

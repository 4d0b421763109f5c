use serde::{Deserialize, Serialize};

use crate::transaction::{AnnotatedTransaction, Rule, RuleFlagSet, Transaction, RULE_COUNT};

/// One flag column per rule, each aligned with the input transactions.
#[derive(Debug, Clone, Default)]
pub struct RuleColumns {
    pub rule1: Vec<bool>,
    pub rule2: Vec<bool>,
    pub rule3: Vec<bool>,
    pub rule4: Vec<bool>,
    pub rule5: Vec<bool>,
}

impl RuleColumns {
    fn flags_at(&self, idx: usize) -> RuleFlagSet {
        let at = |col: &Vec<bool>| col.get(idx).copied().unwrap_or(false);
        RuleFlagSet {
            rule1: at(&self.rule1),
            rule2: at(&self.rule2),
            rule3: at(&self.rule3),
            rule4: at(&self.rule4),
            rule5: at(&self.rule5),
        }
    }
}

/// Pair every transaction with its flags. All transactions are emitted, in
/// input order, whether or not any rule fired.
pub fn aggregate(txs: &[Transaction], columns: &RuleColumns) -> Vec<AnnotatedTransaction> {
    txs.iter()
        .enumerate()
        .map(|(idx, tx)| AnnotatedTransaction::new(tx.clone(), columns.flags_at(idx)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub suspicious: usize,
    /// Fire count per rule, indexed by rule number - 1.
    pub per_rule: [usize; RULE_COUNT],
}

impl RunSummary {
    pub fn from_results(results: &[AnnotatedTransaction]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            if r.suspicious {
                summary.suspicious += 1;
            }
            for rule in &r.triggered_rules {
                summary.per_rule[*rule as usize - 1] += 1;
            }
        }
        summary
    }

    pub fn count(&self, rule: Rule) -> usize {
        self.per_rule[rule.number() as usize - 1]
    }

    pub fn rule_counts(&self) -> Vec<(Rule, usize)> {
        Rule::ALL.iter().map(|r| (*r, self.count(*r))).collect()
    }
}

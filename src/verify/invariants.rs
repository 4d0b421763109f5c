use crate::transaction::{AnnotatedTransaction, Transaction, RULE_COUNT};

#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    pub row: Option<usize>,
    pub msg: String,
}

impl InvariantViolation {
    fn at(row: usize, msg: &str) -> Self {
        Self { row: Some(row), msg: msg.to_string() }
    }
}

pub fn assert_row_invariants(row: usize, r: &AnnotatedTransaction) -> Result<(), InvariantViolation> {
    let rules = &r.triggered_rules;
    if rules.iter().any(|n| *n == 0 || (*n as usize) > RULE_COUNT) {
        return Err(InvariantViolation::at(row, "triggered rule out of range"));
    }
    if rules.windows(2).any(|w| w[0] >= w[1]) {
        return Err(InvariantViolation::at(row, "triggered_rules not strictly ascending"));
    }
    if r.suspicious == rules.is_empty() {
        return Err(InvariantViolation::at(row, "suspicious disagrees with triggered_rules"));
    }
    if *rules != r.flags.triggered_rules() {
        return Err(InvariantViolation::at(row, "triggered_rules disagrees with flags"));
    }
    Ok(())
}

/// Output must mirror the input one-to-one and in order, with consistent flags.
pub fn assert_output_invariants(
    input: &[Transaction],
    output: &[AnnotatedTransaction],
) -> Result<(), InvariantViolation> {
    if input.len() != output.len() {
        return Err(InvariantViolation {
            row: None,
            msg: format!("output has {} rows for {} inputs", output.len(), input.len()),
        });
    }
    for (row, (tx, r)) in input.iter().zip(output).enumerate() {
        if *tx != r.transaction {
            return Err(InvariantViolation::at(row, "output row does not match input row"));
        }
        assert_row_invariants(row, r)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::RuleFlagSet;
    use chrono::NaiveDate;

    fn sample() -> (Transaction, AnnotatedTransaction) {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let tx = Transaction::new("1", ts, "A", 1.0);
        let r = AnnotatedTransaction::new(tx.clone(), RuleFlagSet { rule4: true, ..Default::default() });
        (tx, r)
    }

    #[test]
    fn test_consistent_output_passes() {
        let (tx, r) = sample();
        assert!(assert_output_invariants(&[tx], &[r]).is_ok());
    }

    #[test]
    fn test_length_mismatch() {
        let (tx, _) = sample();
        let err = assert_output_invariants(&[tx], &[]).unwrap_err();
        assert_eq!(err.row, None);
    }

    #[test]
    fn test_detects_tampered_rules() {
        let (tx, mut r) = sample();
        r.triggered_rules = vec![4, 2];
        assert!(assert_output_invariants(&[tx.clone()], &[r.clone()]).is_err());
        r.triggered_rules = vec![];
        let err = assert_output_invariants(&[tx], &[r]).unwrap_err();
        assert_eq!(err.row, Some(0));
    }
}

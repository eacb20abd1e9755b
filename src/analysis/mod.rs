//! Downstream helpers over fitted rules.
//!
//! These work on exported rows and parsed programs; none of them touch
//! the sampler.

use rustc_hash::FxHashMap;

use crate::driver::RuleRow;
use crate::grammar::Op;
use crate::program::Expr;
use crate::types::{Bit, Datum, History};

/// Decay per position for [`rule_importance`].
pub const IMPORTANCE_DECAY: f64 = 0.7;

/// Fraction of records where the rule reproduces the observed bit.
///
/// `None` for an empty record set.
pub fn agreement(program: &Expr, data: &[Datum]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let hits = data
        .iter()
        .filter(|d| program.answer(&d.history) == Some(d.observed))
        .count();
    Some(hits as f64 / data.len() as f64)
}

/// Each participant's highest-posterior row, participants in order of first
/// appearance. The earliest row wins a tie.
pub fn best_rules(rows: &[RuleRow]) -> Vec<&RuleRow> {
    let mut best: Vec<&RuleRow> = Vec::new();
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    for row in rows {
        match index.get(row.participant_id.as_str()) {
            Some(&i) => {
                if row.posterior > best[i].posterior {
                    best[i] = row;
                }
            }
            None => {
                index.insert(&row.participant_id, best.len());
                best.push(row);
            }
        }
    }
    best
}

/// How early `primitive` is consulted: `0.7^k` where `k` is its first
/// position among the rule's calls, `else_` excluded. Zero when absent.
pub fn rule_importance(program: &Expr, primitive: Op) -> f64 {
    program
        .calls()
        .filter(|&op| op != Op::Else)
        .position(|op| op == primitive)
        .map_or(0.0, |k| IMPORTANCE_DECAY.powi(k as i32))
}

/// Posterior-weighted vote of several rules on one history.
///
/// Weights are used as given (typically normalized posteriors, not logs).
/// Returns `None` when the weights do not sum to a positive number.
pub fn model_average<'a, I>(weighted: I, history: &History) -> Option<Bit>
where
    I: IntoIterator<Item = (f64, &'a Expr)>,
{
    let mut total = 0.0;
    let mut ones = 0.0;
    for (w, program) in weighted {
        total += w;
        if program.answer(history) == Some(Bit::One) {
            ones += w;
        }
    }
    if !(total > 0.0) {
        return None;
    }
    Some(if ones / total >= 0.5 { Bit::One } else { Bit::Zero })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(text: &str) -> Expr {
        text.parse().unwrap()
    }

    fn h(s: &str) -> History {
        s.parse().unwrap()
    }

    fn row(id: &str, rule: &str, posterior: f64) -> RuleRow {
        RuleRow {
            participant_id: id.into(),
            rule_text: rule.into(),
            prior: posterior,
            likelihood: 0.0,
            posterior,
        }
    }

    #[test]
    fn test_agreement() {
        let data = vec![
            Datum::new(h("00000001"), Bit::One),
            Datum::new(h("00000000"), Bit::Zero),
            Datum::new(h("11111110"), Bit::One),
            Datum::new(h("11111111"), Bit::One),
        ];
        assert_eq!(agreement(&expr("get_(x, 7)"), &data), Some(0.75));
        assert_eq!(agreement(&expr("get_(x, 7)"), &[]), None);
    }

    #[test]
    fn test_best_rules_per_participant() {
        let rows = vec![
            row("b", "'1'", -5.0),
            row("a", "'0'", -3.0),
            row("b", "get_(x, 7)", -2.0),
            row("b", "get_(x, 0)", -2.0),
        ];
        let best = best_rules(&rows);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].participant_id, "b");
        assert_eq!(best[0].rule_text, "get_(x, 7)");
        assert_eq!(best[1].rule_text, "'0'");
    }

    #[test]
    fn test_rule_importance_positions() {
        let e = expr("else_(streak_(x, 2), else_(invert_(balance_(x, 3)), conform_(x, 1)))");
        // else_ skipped: streak_, invert_, balance_ ...
        assert_eq!(rule_importance(&e, Op::Streak), 1.0);
        assert!((rule_importance(&e, Op::Invert) - 0.7).abs() < 1e-12);
        assert!((rule_importance(&e, Op::Balance) - 0.49).abs() < 1e-12);
        assert_eq!(rule_importance(&e, Op::PatternCont), 0.0);
        assert_eq!(rule_importance(&e, Op::Else), 0.0);
    }

    #[test]
    fn test_rule_importance_first_occurrence() {
        let e = expr("else_(balance_(x, 1), else_(conform_(x, 2), else_(balance_(x, 4), '1')))");
        assert_eq!(rule_importance(&e, Op::Balance), 1.0);
        assert!((rule_importance(&e, Op::Conform) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_model_average_vote() {
        let ones = expr("'1'");
        let zeros = expr("'0'");
        let x = h("01010101");
        assert_eq!(model_average([(0.6, &ones), (0.4, &zeros)], &x), Some(Bit::One));
        assert_eq!(model_average([(0.2, &ones), (0.8, &zeros)], &x), Some(Bit::Zero));
        // An even split goes to one.
        assert_eq!(model_average([(1.0, &ones), (1.0, &zeros)], &x), Some(Bit::One));
    }

    #[test]
    fn test_model_average_zero_weight() {
        let ones = expr("'1'");
        let x = h("01010101");
        assert_eq!(model_average([(0.0, &ones)], &x), None);
        assert_eq!(model_average(std::iter::empty(), &x), None);
    }
}

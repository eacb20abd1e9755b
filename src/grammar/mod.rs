//! Production grammar over rule programs.
//!
//! The grammar defines both the space of syntactically valid rules and the
//! generative prior over that space. Each production rewrites a
//! nonterminal into an operator applied to child nonterminals; weights are
//! relative within a nonterminal and normalized once at build time.
//!
//! ```text
//! START   → PRE_END | COMB
//! COMB    → else_(PRERULE, COMB) | else_(PRERULE, PRE_END)
//! PRE_END → BIT | RULEL | invert_(RULEL)
//! PRERULE → RULE | invert_(RULE)
//! BIT     → '1' | '0'
//! RULEL   → get_(x, INDEX)
//! RULE    → streak_(x, STREAKL) | balance_(x, FREQ)
//!         | conform_(x, FREQ)   | patternCont_(x)
//! INDEX   → 0 | 7
//! STREAKL → 0 | 1 | ... | 6
//! FREQ    → 1 | 2 | 3 | 4
//! ```
//!
//! Every chain bottoms out in `PRE_END`, which always answers, so every
//! derivable program makes a definite prediction.
//!
//! The standard grammar is built once and shared read-only across all
//! participant runs.

use std::fmt;

use once_cell::sync::Lazy;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use thiserror::Error;

use crate::program::Expr;
use crate::types::Bit;

static STANDARD: Lazy<Grammar> = Lazy::new(build_standard);

/// Grammar nonterminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Nonterminal {
    Start,
    Comb,
    PreEnd,
    PreRule,
    Bit,
    RuleL,
    Rule,
    Index,
    StreakL,
    Freq,
}

impl Nonterminal {
    pub const ALL: [Nonterminal; 10] = [
        Nonterminal::Start,
        Nonterminal::Comb,
        Nonterminal::PreEnd,
        Nonterminal::PreRule,
        Nonterminal::Bit,
        Nonterminal::RuleL,
        Nonterminal::Rule,
        Nonterminal::Index,
        Nonterminal::StreakL,
        Nonterminal::Freq,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Nonterminal::Start => "START",
            Nonterminal::Comb => "COMB",
            Nonterminal::PreEnd => "PRE_END",
            Nonterminal::PreRule => "PRERULE",
            Nonterminal::Bit => "BIT",
            Nonterminal::RuleL => "RULEL",
            Nonterminal::Rule => "RULE",
            Nonterminal::Index => "INDEX",
            Nonterminal::StreakL => "STREAKL",
            Nonterminal::Freq => "FREQ",
        }
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operator a production applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Transparent wrapper: evaluates and renders as its only child.
    Pass,
    Else,
    Invert,
    Get,
    Streak,
    Balance,
    Conform,
    PatternCont,
    /// Literal fallback answer.
    Literal(Bit),
    /// Integer parameter (index, streak start, frequency threshold).
    Int(u8),
}

impl Op {
    /// Call operators in rendering/parsing order.
    pub const CALLS: [Op; 7] = [
        Op::Else,
        Op::Invert,
        Op::Get,
        Op::Streak,
        Op::Balance,
        Op::Conform,
        Op::PatternCont,
    ];

    /// Function name in rule text, for call operators.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Op::Else => Some("else_"),
            Op::Invert => Some("invert_"),
            Op::Get => Some("get_"),
            Op::Streak => Some("streak_"),
            Op::Balance => Some("balance_"),
            Op::Conform => Some("conform_"),
            Op::PatternCont => Some("patternCont_"),
            Op::Pass | Op::Literal(_) | Op::Int(_) => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Op> {
        Op::CALLS.into_iter().find(|op| op.name() == Some(name))
    }

    /// Whether the history `x` is passed as the first argument.
    pub fn takes_input(self) -> bool {
        matches!(
            self,
            Op::Get | Op::Streak | Op::Balance | Op::Conform | Op::PatternCont
        )
    }
}

/// `lhs → op(children...)` with a relative weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Production {
    pub lhs: Nonterminal,
    pub op: Op,
    pub children: Vec<Nonterminal>,
    pub weight: f64,
}

/// Problems detected while building a grammar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    #[error("production for {0} has non-positive or non-finite weight {1}")]
    BadWeight(Nonterminal, f64),
    #[error("{0} is referenced but has no productions")]
    MissingNonterminal(Nonterminal),
    #[error("pass-through production for {0} must have exactly one child")]
    BadPass(Nonterminal),
}

/// Accumulates productions; [`GrammarBuilder::build`] normalizes and validates.
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    start: Nonterminal,
    productions: Vec<Production>,
}

impl GrammarBuilder {
    pub fn new(start: Nonterminal) -> Self {
        Self {
            start,
            productions: Vec::new(),
        }
    }

    pub fn add_rule(mut self, lhs: Nonterminal, op: Op, children: &[Nonterminal], weight: f64) -> Self {
        self.productions.push(Production {
            lhs,
            op,
            children: children.to_vec(),
            weight,
        });
        self
    }

    pub fn build(self) -> Result<Grammar, GrammarError> {
        let mut by_lhs: Vec<Vec<usize>> = vec![Vec::new(); Nonterminal::ALL.len()];
        for (id, p) in self.productions.iter().enumerate() {
            if !(p.weight.is_finite() && p.weight > 0.0) {
                return Err(GrammarError::BadWeight(p.lhs, p.weight));
            }
            if p.op == Op::Pass && p.children.len() != 1 {
                return Err(GrammarError::BadPass(p.lhs));
            }
            by_lhs[p.lhs.index()].push(id);
        }

        let referenced = std::iter::once(self.start)
            .chain(self.productions.iter().flat_map(|p| p.children.iter().copied()));
        for nt in referenced {
            if by_lhs[nt.index()].is_empty() {
                return Err(GrammarError::MissingNonterminal(nt));
            }
        }

        let mut log_probs = vec![0.0; self.productions.len()];
        let mut samplers = Vec::with_capacity(by_lhs.len());
        for ids in &by_lhs {
            let total: f64 = ids.iter().map(|&id| self.productions[id].weight).sum();
            for &id in ids {
                log_probs[id] = (self.productions[id].weight / total).ln();
            }
            let sampler = if ids.is_empty() {
                None
            } else {
                let weights = ids.iter().map(|&id| self.productions[id].weight);
                // Weights were checked positive and finite above.
                WeightedIndex::new(weights).ok()
            };
            samplers.push(sampler);
        }

        Ok(Grammar {
            start: self.start,
            productions: self.productions,
            by_lhs,
            log_probs,
            samplers,
        })
    }
}

/// A normalized, immutable production grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
    start: Nonterminal,
    productions: Vec<Production>,
    by_lhs: Vec<Vec<usize>>,
    log_probs: Vec<f64>,
    samplers: Vec<Option<WeightedIndex<f64>>>,
}

impl Grammar {
    /// The fixed rule grammar, shared process-wide.
    pub fn standard() -> &'static Grammar {
        &STANDARD
    }

    pub fn start(&self) -> Nonterminal {
        self.start
    }

    pub fn production(&self, id: usize) -> &Production {
        &self.productions[id]
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Production ids whose left-hand side is `nt`.
    pub fn rules_for(&self, nt: Nonterminal) -> &[usize] {
        &self.by_lhs[nt.index()]
    }

    /// `ln(weight / total weight of the lhs)` for production `id`.
    pub fn log_probability(&self, id: usize) -> f64 {
        self.log_probs[id]
    }

    /// Expand `nt` recursively, choosing each production with probability
    /// proportional to its weight.
    pub fn sample<R: Rng + ?Sized>(&self, nt: Nonterminal, rng: &mut R) -> Expr {
        let ids = &self.by_lhs[nt.index()];
        let pick = match &self.samplers[nt.index()] {
            Some(dist) => dist.sample(rng),
            None => panic!("nonterminal {nt} has no productions"),
        };
        let id = ids[pick];
        let production = &self.productions[id];
        let children = production
            .children
            .iter()
            .map(|&child| self.sample(child, rng))
            .collect();
        Expr::new(nt, id, production.op, children)
    }

    /// Draw a complete program from the start symbol.
    pub fn sample_program<R: Rng + ?Sized>(&self, rng: &mut R) -> Expr {
        self.sample(self.start, rng)
    }

    /// Log probability of generating exactly this derivation tree.
    ///
    /// Also valid for subtrees: the result is the probability of expanding
    /// the subtree's root nonterminal into that subtree.
    pub fn log_prior(&self, expr: &Expr) -> f64 {
        expr.iter().map(|node| self.log_probs[node.rule()]).sum()
    }

    /// Rational-rules prior: production probabilities integrated out under a
    /// symmetric Dirichlet(`alpha`) per nonterminal.
    ///
    /// For a nonterminal with `K` productions used `c_1..c_K` times
    /// (total `C`), the contribution is `ln B(c + alpha) - ln B(alpha)`,
    /// evaluated exactly as a difference of log rising factorials.
    pub fn rational_rules_log_prior(&self, expr: &Expr, alpha: f64) -> f64 {
        let mut counts = vec![0usize; self.productions.len()];
        for node in expr.iter() {
            counts[node.rule()] += 1;
        }

        let mut lp = 0.0;
        for ids in &self.by_lhs {
            let total: usize = ids.iter().map(|&id| counts[id]).sum();
            if total == 0 {
                continue;
            }
            let k = ids.len() as f64;
            for &id in ids {
                lp += ln_rising(alpha, counts[id]);
            }
            lp -= ln_rising(k * alpha, total);
        }
        lp
    }

    /// Subtree-regeneration proposal.
    ///
    /// Picks a node of `program` uniformly, replaces it with a fresh
    /// expansion of the same nonterminal, and returns the new program with
    /// the log forward-minus-backward proposal probability.
    pub fn regenerate<R: Rng + ?Sized>(&self, program: &Expr, rng: &mut R) -> (Expr, f64) {
        let n_old = program.size();
        let target = rng.gen_range(0..n_old);

        let mut proposed = program.clone();
        let (old_lp, new_lp) = match proposed.nth_mut(target) {
            Some(slot) => {
                let fresh = self.sample(slot.nonterminal(), rng);
                let old_lp = self.log_prior(slot);
                let new_lp = self.log_prior(&fresh);
                *slot = fresh;
                (old_lp, new_lp)
            }
            None => unreachable!("target {target} drawn from 0..{n_old}"),
        };
        let n_new = proposed.size();

        let forward = -(n_old as f64).ln() + new_lp;
        let backward = -(n_new as f64).ln() + old_lp;
        (proposed, forward - backward)
    }
}

/// `ln(x (x+1) ... (x+n-1))`, i.e. `ln Γ(x+n) - ln Γ(x)` for integer `n`.
fn ln_rising(x: f64, n: usize) -> f64 {
    (0..n).map(|k| (x + k as f64).ln()).sum()
}

fn build_standard() -> Grammar {
    use Nonterminal as N;

    let mut builder = GrammarBuilder::new(N::Start)
        .add_rule(N::Start, Op::Pass, &[N::PreEnd], 1.0)
        .add_rule(N::Start, Op::Pass, &[N::Comb], 1.0)
        .add_rule(N::Comb, Op::Else, &[N::PreRule, N::Comb], 1.0)
        .add_rule(N::Comb, Op::Else, &[N::PreRule, N::PreEnd], 1.0)
        .add_rule(N::PreEnd, Op::Pass, &[N::Bit], 1.0)
        .add_rule(N::PreEnd, Op::Pass, &[N::RuleL], 1.0)
        .add_rule(N::PreEnd, Op::Invert, &[N::RuleL], 1.0)
        .add_rule(N::PreRule, Op::Pass, &[N::Rule], 1.0)
        .add_rule(N::PreRule, Op::Invert, &[N::Rule], 1.0)
        .add_rule(N::Bit, Op::Literal(Bit::One), &[], 1.0)
        .add_rule(N::Bit, Op::Literal(Bit::Zero), &[], 1.0)
        .add_rule(N::Index, Op::Int(0), &[], 1.0)
        .add_rule(N::Index, Op::Int(7), &[], 1.0);

    for n in 0..=6 {
        builder = builder.add_rule(N::StreakL, Op::Int(n), &[], 1.0);
    }
    for n in 1..=4 {
        builder = builder.add_rule(N::Freq, Op::Int(n), &[], 1.0);
    }

    builder
        .add_rule(N::RuleL, Op::Get, &[N::Index], 1.0)
        .add_rule(N::Rule, Op::Streak, &[N::StreakL], 1.0)
        .add_rule(N::Rule, Op::Balance, &[N::Freq], 1.0)
        .add_rule(N::Rule, Op::Conform, &[N::Freq], 1.0)
        .add_rule(N::Rule, Op::PatternCont, &[], 1.0)
        .build()
        .expect("standard grammar is well-formed")
}

//! Scoring programs against a participant's predictions.
//!
//! ## Prior
//!
//! The baseline prior is the grammar's generative probability of the
//! derivation tree. The optional rational-rules prior integrates the
//! production probabilities out under a symmetric Dirichlet, which rewards
//! reusing the same production. Trees larger than `max_nodes` get a prior
//! of −∞ and can never be accepted.
//!
//! ## Likelihood
//!
//! A noisy-participant model: with probability `alpha` the participant
//! follows the rule, otherwise they answer uniformly over a hundred-way
//! guess. A match costs `ln(alpha + (1 - alpha)/100)`, a mismatch
//! `ln((1 - alpha)/100)`. Mismatches are expensive but finite, so the
//! chain can walk through imperfect rules.
//!
//! ## Temperatures
//!
//! Stored prior and likelihood are already divided by their temperatures,
//! so `posterior == prior + likelihood` always holds for reported values.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::grammar::Grammar;
use crate::program::Expr;
use crate::types::{Bit, Datum, History};

/// Which structural prior to score programs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorKind {
    /// Product of production probabilities along the derivation.
    #[default]
    Production,
    /// Dirichlet-integrated production probabilities.
    RationalRules,
}

/// Parameters of the posterior.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    /// Probability the participant follows the rule.
    pub alpha: f64,
    pub prior: PriorKind,
    /// Dirichlet concentration for [`PriorKind::RationalRules`].
    pub rr_alpha: f64,
    /// Largest tree (in nodes) with a finite prior.
    pub max_nodes: usize,
    pub prior_temperature: f64,
    pub likelihood_temperature: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            alpha: 0.999,
            prior: PriorKind::Production,
            rr_alpha: 1.0,
            max_nodes: 25,
            prior_temperature: 1.0,
            likelihood_temperature: 1.0,
        }
    }
}

/// A scored program.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    program: Expr,
    key: String,
    prior: f64,
    likelihood: f64,
    posterior: f64,
}

impl Hypothesis {
    pub fn program(&self) -> &Expr {
        &self.program
    }

    /// Canonical rule text; identifies the rule for deduplication.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn likelihood(&self) -> f64 {
        self.likelihood
    }

    pub fn posterior(&self) -> f64 {
        self.posterior
    }

    /// The rule's prediction for `history`.
    pub fn predict(&self, history: &History) -> Option<Bit> {
        self.program.answer(history)
    }

    /// Propose a neighbouring hypothesis by subtree regeneration.
    ///
    /// Returns the scored proposal and the log forward-minus-backward
    /// proposal probability for the Hastings correction.
    pub fn propose<R: Rng + ?Sized>(&self, model: &Model<'_>, rng: &mut R) -> (Hypothesis, f64) {
        let (program, log_fb) = model.grammar().regenerate(&self.program, rng);
        (model.score(program), log_fb)
    }
}

/// Everything needed to score programs for one participant.
#[derive(Debug, Clone, Copy)]
pub struct Model<'a> {
    grammar: &'a Grammar,
    data: &'a [Datum],
    params: &'a ModelParams,
}

impl<'a> Model<'a> {
    pub fn new(grammar: &'a Grammar, data: &'a [Datum], params: &'a ModelParams) -> Self {
        Self {
            grammar,
            data,
            params,
        }
    }

    pub fn grammar(&self) -> &'a Grammar {
        self.grammar
    }

    pub fn data(&self) -> &'a [Datum] {
        self.data
    }

    pub fn params(&self) -> &'a ModelParams {
        self.params
    }

    /// Untempered log prior.
    pub fn log_prior(&self, program: &Expr) -> f64 {
        if program.size() > self.params.max_nodes {
            return f64::NEG_INFINITY;
        }
        match self.params.prior {
            PriorKind::Production => self.grammar.log_prior(program),
            PriorKind::RationalRules => {
                self.grammar.rational_rules_log_prior(program, self.params.rr_alpha)
            }
        }
    }

    /// Untempered log likelihood. Zero (neutral) when there is no data.
    pub fn log_likelihood(&self, program: &Expr) -> f64 {
        let alpha = self.params.alpha;
        let hit = (alpha + (1.0 - alpha) / 100.0).ln();
        let miss = ((1.0 - alpha) / 100.0).ln();

        let hits = self
            .data
            .iter()
            .filter(|d| program.answer(&d.history) == Some(d.observed))
            .count();
        let misses = self.data.len() - hits;

        // Avoid 0 * -inf when alpha == 1 and every datum matches.
        let mut ll = hits as f64 * hit;
        if misses > 0 {
            ll += misses as f64 * miss;
        }
        ll
    }

    /// Score a program.
    pub fn score(&self, program: Expr) -> Hypothesis {
        let prior = self.log_prior(&program) / self.params.prior_temperature;
        // Skip the data pass for programs that can never be accepted.
        let likelihood = if prior == f64::NEG_INFINITY {
            f64::NEG_INFINITY
        } else {
            self.log_likelihood(&program) / self.params.likelihood_temperature
        };
        let key = program.to_string();
        Hypothesis {
            program,
            key,
            prior,
            likelihood,
            posterior: prior + likelihood,
        }
    }
}

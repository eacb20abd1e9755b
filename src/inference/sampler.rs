//! Metropolis-Hastings over program space.
//!
//! The chain is a lazy iterator: each call to `next` makes one proposal,
//! accepts or rejects it, and yields the (possibly unchanged) current
//! state. It yields exactly `steps` states and then stops; there is no
//! burn-in, thinning or convergence check.
//!
//! States are handed out as `Rc<Hypothesis>` so a rejected step costs a
//! reference-count bump rather than a tree clone. A chain is confined to
//! one thread; independent chains run on independent threads.

use std::rc::Rc;

use rand::Rng;

use super::hypothesis::{Hypothesis, Model};

/// Counters for one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub steps: usize,
    pub accepted: usize,
}

impl SamplerStats {
    /// Fraction of proposals accepted; 0 before the first step.
    pub fn acceptance_rate(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.accepted as f64 / self.steps as f64
        }
    }
}

/// Log acceptance ratio for moving from `current` to `proposed` given the
/// log forward-minus-backward proposal probability.
///
/// A proposal with posterior −∞ is never accepted. A chain stuck on a
/// −∞ state accepts any finite proposal.
pub fn log_acceptance(current: f64, proposed: f64, log_fb: f64) -> f64 {
    if proposed == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else if current == f64::NEG_INFINITY {
        f64::INFINITY
    } else {
        proposed - current - log_fb
    }
}

/// Accept with probability `min(1, exp(log_ratio))`.
pub fn metropolis_accept<R: Rng + ?Sized>(log_ratio: f64, rng: &mut R) -> bool {
    if log_ratio >= 0.0 {
        return true;
    }
    if log_ratio == f64::NEG_INFINITY || log_ratio.is_nan() {
        return false;
    }
    rng.r#gen::<f64>() < log_ratio.exp()
}

/// A fixed-length Metropolis-Hastings chain.
pub struct MetropolisHastings<'a, R> {
    model: Model<'a>,
    rng: R,
    current: Rc<Hypothesis>,
    remaining: usize,
    stats: SamplerStats,
}

impl<'a, R: Rng> MetropolisHastings<'a, R> {
    pub fn new(model: Model<'a>, initial: Hypothesis, steps: usize, rng: R) -> Self {
        Self {
            model,
            rng,
            current: Rc::new(initial),
            remaining: steps,
            stats: SamplerStats::default(),
        }
    }

    pub fn current(&self) -> &Rc<Hypothesis> {
        &self.current
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    fn step(&mut self) {
        let (proposed, log_fb) = self.current.propose(&self.model, &mut self.rng);
        let ratio = log_acceptance(self.current.posterior(), proposed.posterior(), log_fb);
        self.stats.steps += 1;
        if metropolis_accept(ratio, &mut self.rng) {
            self.current = Rc::new(proposed);
            self.stats.accepted += 1;
        }
    }
}

impl<R: Rng> Iterator for MetropolisHastings<'_, R> {
    type Item = Rc<Hypothesis>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.step();
        Some(Rc::clone(&self.current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<R: Rng> ExactSizeIterator for MetropolisHastings<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, Nonterminal};
    use crate::inference::ModelParams;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_uphill_always_accepted() {
        let mut rng = StdRng::seed_from_u64(1);
        for i in 0..10_000 {
            let delta = (i % 50) as f64 * 0.1;
            assert!(metropolis_accept(delta, &mut rng));
        }
    }

    #[test]
    fn test_downhill_rate_matches_ratio() {
        let mut rng = StdRng::seed_from_u64(2);
        let n = 100_000;
        let delta = 0.25f64.ln();
        let accepted = (0..n).filter(|_| metropolis_accept(delta, &mut rng)).count();
        let rate = accepted as f64 / n as f64;
        assert!((rate - 0.25).abs() < 0.01, "rate {rate}");

        let far = (0..n).filter(|_| metropolis_accept(-50.0, &mut rng)).count();
        assert_eq!(far, 0);
    }

    #[test]
    fn test_log_acceptance_edges() {
        assert_eq!(log_acceptance(-3.0, f64::NEG_INFINITY, 0.0), f64::NEG_INFINITY);
        assert_eq!(log_acceptance(f64::NEG_INFINITY, -3.0, 0.5), f64::INFINITY);
        assert!((log_acceptance(-3.0, -2.0, 0.25) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_chain_yields_exact_step_count() {
        let params = ModelParams::default();
        let model = Model::new(Grammar::standard(), &[], &params);
        let initial = model.score("get_(x, 0)".parse().unwrap());
        let chain = MetropolisHastings::new(model, initial, 1234, StdRng::seed_from_u64(4));
        assert_eq!(chain.len(), 1234);
        assert_eq!(chain.count(), 1234);
    }

    #[test]
    fn test_chain_is_reproducible() {
        let params = ModelParams::default();
        let model = Model::new(Grammar::standard(), &[], &params);
        let run = |seed| {
            let initial = model.score("'1'".parse().unwrap());
            MetropolisHastings::new(model, initial, 500, StdRng::seed_from_u64(seed))
                .map(|h| h.key().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
        assert_ne!(run(9), run(10));
    }

    #[test]
    fn test_reaches_target_program() {
        let params = ModelParams::default();
        let model = Model::new(Grammar::standard(), &[], &params);
        let initial = model.score("get_(x, 0)".parse().unwrap());
        let mut chain = MetropolisHastings::new(model, initial, 200_000, StdRng::seed_from_u64(17));
        let target = "else_(balance_(x, 2), '1')";
        assert!(chain.any(|h| h.key() == target), "never visited {target}");
    }

    #[test]
    fn test_prior_only_chain_samples_the_prior() {
        // Without data and without the node cap the stationary distribution
        // is the grammar prior, under which START picks COMB half the time.
        let params = ModelParams {
            max_nodes: usize::MAX,
            ..ModelParams::default()
        };
        let model = Model::new(Grammar::standard(), &[], &params);
        let initial = model.score("'0'".parse().unwrap());
        let n = 100_000;
        let chains = MetropolisHastings::new(model, initial, n, StdRng::seed_from_u64(23))
            .filter(|h| h.program().children()[0].nonterminal() == Nonterminal::Comb)
            .count();
        let rate = chains as f64 / n as f64;
        assert!((rate - 0.5).abs() < 0.05, "chain rate {rate}");
    }

    #[test]
    fn test_stats_track_acceptances() {
        let params = ModelParams::default();
        let model = Model::new(Grammar::standard(), &[], &params);
        let initial = model.score("get_(x, 7)".parse().unwrap());
        let mut chain = MetropolisHastings::new(model, initial, 2000, StdRng::seed_from_u64(8));
        chain.by_ref().for_each(drop);
        let stats = chain.stats();
        assert_eq!(stats.steps, 2000);
        assert!(stats.accepted > 0 && stats.accepted <= stats.steps);
        assert!(stats.acceptance_rate() > 0.0 && stats.acceptance_rate() <= 1.0);
    }
}

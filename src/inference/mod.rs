//! Posterior search over rule programs.
//!
//! | Piece                   | Role                                              |
//! |-------------------------|---------------------------------------------------|
//! | [`Model`]               | prior + likelihood for one participant's data     |
//! | [`Hypothesis`]          | a program with its cached scores                  |
//! | [`MetropolisHastings`]  | fixed-length chain, yields every visited state    |
//! | [`TopN`]                | best distinct hypotheses seen along the chain     |
//!
//! All scores are natural logs and never normalized.

mod hypothesis;
mod sampler;
mod topn;

pub use hypothesis::{Hypothesis, Model, ModelParams, PriorKind};
pub use sampler::{MetropolisHastings, SamplerStats, log_acceptance, metropolis_accept};
pub use topn::{Keyed, TopN};

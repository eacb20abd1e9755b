//! bitrule - Bayesian program induction of binary prediction rules
//!
//! Given each participant's next-bit predictions after eight-bit
//! histories, bitrule searches a small rule grammar for the programs that
//! best explain those predictions and keeps the top N per participant.
//!
//! # Architecture
//!
//! ```text
//! Loading → Grammar prior → MH chain per participant → Top-N → Export
//!    ↓           ↓                  ↓                    ↓        ↓
//!  csv /     production        subtree-regeneration    dedup    csv /
//!  serde     probabilities     proposals, rayon pool   by text  serde
//! ```
//!
//! # Modules
//!
//! - [`types`]: bits, histories, participant records
//! - [`primitives`]: the functions rules are built from
//! - [`grammar`]: the rule grammar, sampling and priors
//! - [`program`]: derivation trees, evaluation, rule text
//! - [`inference`]: scoring, the sampler, the top-N store
//! - [`driver`]: per-participant runs on a worker pool
//! - [`data`]: input and output formats
//! - [`analysis`]: agreement, best rules, importance, model averaging
//! - [`config`]: bitrule.toml

pub mod analysis;
pub mod config;
pub mod data;
pub mod driver;
pub mod grammar;
pub mod inference;
pub mod primitives;
pub mod program;
pub mod types;

// Re-export core types
pub use config::SearchConfig;
pub use driver::{ParticipantFit, RuleRow, fit_all, fit_participant};
pub use grammar::Grammar;
pub use inference::{Hypothesis, MetropolisHastings, Model, ModelParams, TopN};
pub use program::{Expr, ParseError};
pub use types::{Bit, Datum, History, ParticipantRecord};

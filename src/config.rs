//! Search configuration from bitrule.toml or pyproject.toml.
//!
//! Follows the ruff/black convention:
//! - standalone `bitrule.toml`
//! - `[tool.bitrule]` section in pyproject.toml as fallback
//!
//! Command-line flags override file values field by field.
//!
//! ## Example
//!
//! ```toml
//! steps = 200000
//! top-n = 10
//! alpha = 0.999
//! seed = 7
//! prior = "rational-rules"
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::inference::{ModelParams, PriorKind};

/// Smallest derivable program: START → PRE_END → BIT → literal.
const MIN_PROGRAM_NODES: usize = 3;

/// Effective search configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// File the values came from (for display).
    pub source: Option<PathBuf>,

    /// Metropolis-Hastings steps per participant.
    pub steps: usize,

    /// Hypotheses retained per participant.
    pub top_n: usize,

    /// Probability the participant follows their rule.
    pub alpha: f64,

    /// Worker threads. `None` uses the available parallelism.
    pub workers: Option<usize>,

    /// Base seed; each participant's stream is derived from it and the id.
    pub seed: u64,

    pub prior: PriorKind,
    pub rr_alpha: f64,
    pub max_nodes: usize,
    pub prior_temperature: f64,
    pub likelihood_temperature: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let model = ModelParams::default();
        Self {
            source: None,
            steps: 500_000,
            top_n: 10,
            alpha: model.alpha,
            workers: None,
            seed: 0,
            prior: model.prior,
            rr_alpha: model.rr_alpha,
            max_nodes: model.max_nodes,
            prior_temperature: model.prior_temperature,
            likelihood_temperature: model.likelihood_temperature,
        }
    }
}

/// Partial config as deserialized from TOML, or as collected from flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigOverrides {
    pub steps: Option<usize>,
    pub top_n: Option<usize>,
    pub alpha: Option<f64>,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
    pub prior: Option<PriorKind>,
    pub rr_alpha: Option<f64>,
    pub max_nodes: Option<usize>,
    pub prior_temperature: Option<f64>,
    pub likelihood_temperature: Option<f64>,
}

/// Wrapper for pyproject.toml structure.
#[derive(Debug, Deserialize)]
struct PyProject {
    tool: Option<PyProjectTool>,
}

#[derive(Debug, Deserialize)]
struct PyProjectTool {
    bitrule: Option<ConfigOverrides>,
}

impl SearchConfig {
    /// Load configuration for the given directory.
    ///
    /// Search order:
    /// 1. bitrule.toml in directory
    /// 2. pyproject.toml [tool.bitrule] in directory
    /// 3. The same two files in each parent directory
    /// 4. Defaults if nothing found
    ///
    /// A file that exists but does not parse is an error.
    pub fn load(directory: &Path) -> Result<Self> {
        for dir in directory.ancestors() {
            let standalone = dir.join("bitrule.toml");
            if standalone.is_file() {
                return Self::from_file(&standalone);
            }
            let pyproject = dir.join("pyproject.toml");
            if pyproject.is_file() {
                if let Some(config) = Self::load_pyproject(&pyproject)? {
                    return Ok(config);
                }
            }
        }
        Ok(Self::default())
    }

    /// Load a standalone TOML file (flat keys, no section).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let raw: ConfigOverrides = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        let mut config = Self::default().with_overrides(raw);
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn load_pyproject(path: &Path) -> Result<Option<Self>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let pyproject: PyProject = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let Some(raw) = pyproject.tool.and_then(|t| t.bitrule) else {
            return Ok(None);
        };
        let mut config = Self::default().with_overrides(raw);
        config.source = Some(path.to_path_buf());
        Ok(Some(config))
    }

    /// Replace every field the overrides set.
    pub fn with_overrides(mut self, o: ConfigOverrides) -> Self {
        if let Some(v) = o.steps {
            self.steps = v;
        }
        if let Some(v) = o.top_n {
            self.top_n = v;
        }
        if let Some(v) = o.alpha {
            self.alpha = v;
        }
        if o.workers.is_some() {
            self.workers = o.workers;
        }
        if let Some(v) = o.seed {
            self.seed = v;
        }
        if let Some(v) = o.prior {
            self.prior = v;
        }
        if let Some(v) = o.rr_alpha {
            self.rr_alpha = v;
        }
        if let Some(v) = o.max_nodes {
            self.max_nodes = v;
        }
        if let Some(v) = o.prior_temperature {
            self.prior_temperature = v;
        }
        if let Some(v) = o.likelihood_temperature {
            self.likelihood_temperature = v;
        }
        self
    }

    /// Reject configurations no chain should start with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.steps > 0, "steps must be at least 1");
        ensure!(self.top_n > 0, "top-n must be at least 1");
        ensure!(
            (0.0..=1.0).contains(&self.alpha),
            "alpha must lie in [0, 1], got {}",
            self.alpha
        );
        ensure!(self.workers != Some(0), "workers must be at least 1");
        ensure!(
            self.rr_alpha.is_finite() && self.rr_alpha > 0.0,
            "rr-alpha must be positive, got {}",
            self.rr_alpha
        );
        ensure!(
            self.max_nodes >= MIN_PROGRAM_NODES,
            "max-nodes must be at least {MIN_PROGRAM_NODES}, got {}",
            self.max_nodes
        );
        for (name, t) in [
            ("prior-temperature", self.prior_temperature),
            ("likelihood-temperature", self.likelihood_temperature),
        ] {
            ensure!(t.is_finite() && t > 0.0, "{name} must be positive, got {t}");
        }
        Ok(())
    }

    /// Worker threads to run with.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// The posterior parameters shared by every participant run.
    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            alpha: self.alpha,
            prior: self.prior,
            rr_alpha: self.rr_alpha,
            max_nodes: self.max_nodes,
            prior_temperature: self.prior_temperature,
            likelihood_temperature: self.likelihood_temperature,
        }
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();

        match &self.source {
            Some(source) => lines.push(format!("   Config: {}", source.display())),
            None => lines.push("   Config: (defaults)".to_string()),
        }

        lines.push(format!(
            "   Chain: {} steps, top {}, seed {}",
            self.steps, self.top_n, self.seed
        ));
        lines.push(format!("   Workers: {}", self.effective_workers()));

        let prior = match self.prior {
            PriorKind::Production => "production".to_string(),
            PriorKind::RationalRules => format!("rational-rules (alpha {})", self.rr_alpha),
        };
        lines.push(format!(
            "   Model: alpha {}, prior {}, max {} nodes",
            self.alpha, prior, self.max_nodes
        ));

        if self.prior_temperature != 1.0 || self.likelihood_temperature != 1.0 {
            lines.push(format!(
                "   Temperatures: prior {}, likelihood {}",
                self.prior_temperature, self.likelihood_temperature
            ));
        }

        lines.join("\n")
    }
}

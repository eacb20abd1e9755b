//! bitrule CLI - per-participant rule induction
//!
//! Orchestrates the pipeline for a study's prediction data:
//!
//! 1. Configuration: bitrule.toml / pyproject.toml, then flag overrides
//! 2. Loading: participant rows from CSV or JSON
//! 3. Search: one Metropolis-Hastings chain per participant, in parallel
//! 4. Export: the retained top-N rules per participant as CSV or JSON
//!
//! Two small companions work on exported rules: `predict` evaluates a rule
//! on histories, `importance` scores how early a primitive is consulted.
//!
//! Results go to stdout or the output file; progress goes to stderr.

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;

use bitrule::analysis::{best_rules, rule_importance};
use bitrule::config::{ConfigOverrides, SearchConfig};
use bitrule::data::{load_participants, read_rows, write_rows, write_rows_csv};
use bitrule::driver::{fit_all, into_rows};
use bitrule::grammar::{Grammar, Op};
use bitrule::inference::PriorKind;
use bitrule::program::Expr;
use bitrule::types::History;

/// Bayesian rule induction for binary sequence predictions
///
/// For each participant, bitrule searches a grammar of small rules
/// (streaks, balance, conformity, pattern continuation, bit lookup) for
/// the ones that best explain that participant's next-bit predictions.
///
/// Examples:
///   bitrule fit predictions.csv -o rules.csv     # Fit every participant
///   bitrule fit data.json --steps 50000 -v       # Quick run with progress
///   bitrule predict "get_(x, 7)" 00000001        # Evaluate a rule
///   bitrule importance rules.csv -p balance_     # Rule importance table
#[derive(Parser, Debug)]
#[command(name = "bitrule")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Infer the top-N rules for every participant
    Fit(FitArgs),
    /// Evaluate a rule on one or more histories
    Predict(PredictArgs),
    /// Score how early primitives appear in each participant's best rule
    Importance(ImportanceArgs),
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Participant data (.csv or .json)
    ///
    /// CSV needs participant_id, sequence and prediction columns.
    /// JSON maps participant ids to [sequence, prediction] pairs.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (.csv or .json). Defaults to CSV on stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Config file. Defaults to bitrule.toml or pyproject.toml [tool.bitrule]
    /// found from the current directory upwards.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Metropolis-Hastings steps per participant
    #[arg(long)]
    steps: Option<usize>,

    /// Rules retained per participant
    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Probability a participant follows their rule
    #[arg(long)]
    alpha: Option<f64>,

    /// Worker threads (default: available parallelism)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Base random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Structural prior over rules
    #[arg(long, value_enum)]
    prior: Option<PriorArg>,

    /// Largest rule tree, in grammar nodes
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Verbose output
    ///
    /// Shows the effective configuration, loading progress and one line per
    /// participant with its best rule and the chain's acceptance rate.
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Rule text, e.g. "else_(balance_(x, 2), '1')"
    rule: String,

    /// Eight-symbol histories to evaluate
    #[arg(required = true, value_name = "HISTORY")]
    histories: Vec<String>,
}

#[derive(Args, Debug)]
struct ImportanceArgs {
    /// Rules exported by `bitrule fit`
    #[arg(value_name = "RULES_FILE")]
    rules: PathBuf,

    /// Primitive to score (repeatable), e.g. balance_ or conform
    #[arg(short, long = "primitive", required = true, value_name = "NAME")]
    primitives: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PriorArg {
    Production,
    RationalRules,
}

impl From<PriorArg> for PriorKind {
    fn from(arg: PriorArg) -> Self {
        match arg {
            PriorArg::Production => PriorKind::Production,
            PriorArg::RationalRules => PriorKind::RationalRules,
        }
    }
}

impl FitArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            steps: self.steps,
            top_n: self.top_n,
            alpha: self.alpha,
            workers: self.workers,
            seed: self.seed,
            prior: self.prior.map(PriorKind::from),
            max_nodes: self.max_nodes,
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Fit(args) => run_fit(&args),
        Command::Predict(args) => run_predict(&args),
        Command::Importance(args) => run_importance(&args),
    }
}

/// Load, search every participant, export.
fn run_fit(args: &FitArgs) -> Result<()> {
    let start = Instant::now();

    let file_config = match &args.config {
        Some(path) => SearchConfig::from_file(path)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
            SearchConfig::load(&cwd)?
        }
    };
    let config = file_config.with_overrides(args.overrides());
    config.validate().context("Invalid search configuration")?;

    if args.verbose {
        eprintln!("🧠 bitrule v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("📂 Input: {}", args.input.display());
        eprintln!("{}", config.display_summary());
    }

    let records = load_participants(&args.input)?;
    let predictions: usize = records.iter().map(|r| r.data.len()).sum();

    if args.verbose {
        eprintln!(
            "✓ Loaded {} participants, {} predictions ({:.2?})",
            records.len(),
            predictions,
            start.elapsed()
        );
    }
    for record in records.iter().filter(|r| r.data.is_empty()) {
        eprintln!("⚠️  {} has no predictions; its rules reflect the prior only", record.id);
    }
    if records.is_empty() {
        eprintln!("⚠️  No participants found in {}", args.input.display());
    }

    let search_start = Instant::now();
    let verbose = args.verbose;
    let fits = fit_all(&records, Grammar::standard(), &config, |fit| {
        if !verbose {
            return;
        }
        match fit.best() {
            Some(best) => eprintln!(
                "✓ {}: {} (posterior {:.3}, acceptance {:.1}%, {:.2?})",
                fit.participant_id,
                best.rule_text,
                best.posterior,
                fit.stats.acceptance_rate() * 100.0,
                fit.elapsed
            ),
            None => eprintln!("⚠️  {}: no rule retained", fit.participant_id),
        }
    })?;
    let searched = search_start.elapsed();

    let participants = fits.len();
    let rows = into_rows(fits);

    match &args.output {
        Some(path) => write_rows(path, &rows)?,
        None => write_rows_csv(io::stdout().lock(), &rows).context("Failed to write results")?,
    }

    if args.verbose {
        let title = " FIT COMPLETE ";
        eprintln!();
        if args.no_color {
            eprintln!("{title}");
        } else {
            eprintln!("{}", title.bold().on_green());
        }
        eprintln!("  Participants: {participants}");
        eprintln!("  Rules:        {}", rows.len());
        eprintln!("  Search:       {searched:.2?}");
        if let Some(path) = &args.output {
            eprintln!("  Output:       {}", path.display());
        }
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Total time: {:.2?}", start.elapsed());
    }

    Ok(())
}

fn run_predict(args: &PredictArgs) -> Result<()> {
    let rule: Expr = args
        .rule
        .parse()
        .with_context(|| format!("Invalid rule {:?}", args.rule))?;

    for text in &args.histories {
        let history: History = text
            .parse()
            .with_context(|| format!("Invalid history {text:?}"))?;
        match rule.answer(&history) {
            Some(bit) => println!("{history}\t{bit}"),
            None => println!("{history}\t-"),
        }
    }
    Ok(())
}

/// Importance table over each participant's best rule.
fn run_importance(args: &ImportanceArgs) -> Result<()> {
    let primitives = args
        .primitives
        .iter()
        .map(|name| parse_primitive(name))
        .collect::<Result<Vec<_>>>()?;

    let rows = read_rows(&args.rules)?;
    let grammar = Grammar::standard();

    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    let mut header = vec!["participant_id".to_string(), "rule_text".to_string()];
    header.extend(primitives.iter().filter_map(|op| op.name()).map(str::to_string));
    wtr.write_record(&header)?;

    for row in best_rules(&rows) {
        let program = grammar.parse(&row.rule_text).with_context(|| {
            format!("Invalid rule for {}: {:?}", row.participant_id, row.rule_text)
        })?;
        let mut record = vec![row.participant_id.clone(), row.rule_text.clone()];
        record.extend(
            primitives
                .iter()
                .map(|&op| rule_importance(&program, op).to_string()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Accepts `balance_` or `balance`.
fn parse_primitive(name: &str) -> Result<Op> {
    let op = Op::from_name(name).or_else(|| Op::from_name(&format!("{name}_")));
    match op {
        Some(Op::Else) => bail!("else_ only chains rules and has no importance"),
        Some(op) => Ok(op),
        None => bail!("Unknown primitive {name:?}"),
    }
}

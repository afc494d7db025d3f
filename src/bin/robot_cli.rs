use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use robot_trainer::demonstration::ALL_ACTIONS;
use robot_trainer::{
    AppConfig, DecisionPolicy, DemonstrationSet, FeatureMode, RobotSession, TrainingTrace,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "robot_cli",
    about = "Train and query the demonstration classifier from the command line"
)]
struct Cli {
    /// Configuration file (defaults to assets/robot_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the number of training epochs
    #[arg(long)]
    epochs: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the note-name to note-index table
    Notes {
        /// Look up a single note instead of dumping the table
        #[arg(long)]
        note: Option<String>,
    },
    /// Train on a demonstration file and report the trace summary
    Train {
        #[arg(long)]
        demos: PathBuf,
        #[arg(long, value_enum)]
        mode: ModeArg,
        /// Write the full per-epoch trace as JSON
        #[arg(long)]
        trace_out: Option<PathBuf>,
    },
    /// Train on a demonstration file, then predict one encoded feature vector
    Predict {
        #[arg(long)]
        demos: PathBuf,
        #[arg(long, value_enum)]
        mode: ModeArg,
        /// Comma-separated encoded features, e.g. "0,0,0,0,0,0,0,0,0,5"
        #[arg(long)]
        features: String,
        #[arg(long, value_enum, default_value_t = PolicyArg::WinnerTakeAll)]
        policy: PolicyArg,
        /// Seed for the sampling policy
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    NoteOnly,
    CaptorsAndNote,
}

impl From<ModeArg> for FeatureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::NoteOnly => FeatureMode::NoteOnly,
            ModeArg::CaptorsAndNote => FeatureMode::CaptorsAndNote,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    WinnerTakeAll,
    Sampling,
}

impl From<PolicyArg> for DecisionPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::WinnerTakeAll => DecisionPolicy::WinnerTakeAll,
            PolicyArg::Sampling => DecisionPolicy::Sampling,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    if let Some(epochs) = cli.epochs {
        config.model.epochs = epochs;
    }

    match cli.command {
        Commands::Notes { note } => run_notes(config, note.as_deref()),
        Commands::Train {
            demos,
            mode,
            trace_out,
        } => run_train(config, &demos, mode.into(), trace_out),
        Commands::Predict {
            demos,
            mode,
            features,
            policy,
            seed,
        } => {
            if seed.is_some() {
                config.prediction.sampling_seed = seed;
            }
            run_predict(config, &demos, mode.into(), &features, policy.into())
        }
    }
}

fn run_notes(config: AppConfig, note: Option<&str>) -> Result<ExitCode> {
    let session = RobotSession::new(config);
    let notes = session.notes();

    if let Some(note) = note {
        let payload = NoteLookupPayload {
            note,
            index: notes.index_of(note),
        };
        println!("{}", serde_json::to_string(&payload)?);
        return Ok(ExitCode::from(0));
    }

    let (low, high) = notes.boundaries();
    let entries = notes
        .entries()
        .into_iter()
        .map(|(name, index)| NoteEntry {
            note: name.to_string(),
            index,
        })
        .collect();
    let payload = NoteTablePayload {
        low: low.to_string(),
        high: high.to_string(),
        max_index: notes.max_index(),
        vocabulary: notes.vocabulary_size(),
        entries,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

fn run_train(
    config: AppConfig,
    demos: &Path,
    mode: FeatureMode,
    trace_out: Option<PathBuf>,
) -> Result<ExitCode> {
    let session = RobotSession::new(config);
    let demonstrations = load_demos(demos)?;
    let trace = session
        .train_blocking(&demonstrations, mode)
        .with_context(|| format!("training on {}", demos.display()))?;

    if let Some(path) = trace_out {
        fs::write(&path, trace.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let payload = TrainReportPayload::new(&trace, &demonstrations);
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

fn run_predict(
    config: AppConfig,
    demos: &Path,
    mode: FeatureMode,
    features: &str,
    policy: DecisionPolicy,
) -> Result<ExitCode> {
    let features = parse_features(features)?;
    let session = RobotSession::new(config);
    let demonstrations = load_demos(demos)?;
    session
        .train_blocking(&demonstrations, mode)
        .with_context(|| format!("training on {}", demos.display()))?;

    let result = session.predict(&features, policy)?;
    let payload = PredictPayload {
        action: result.action.as_str(),
        policy: policy.display_name(),
        probabilities: &result.probabilities,
    };
    println!("{}", serde_json::to_string(&payload)?);
    Ok(ExitCode::from(0))
}

fn load_demos(path: &Path) -> Result<DemonstrationSet> {
    DemonstrationSet::load(path).with_context(|| format!("loading {}", path.display()))
}

fn parse_features(raw: &str) -> Result<Vec<f32>> {
    let features = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .with_context(|| format!("invalid feature value '{}'", part))
        })
        .collect::<Result<Vec<_>>>()?;
    if features.is_empty() {
        bail!("no feature values given");
    }
    Ok(features)
}

#[derive(Serialize)]
struct NoteLookupPayload<'a> {
    note: &'a str,
    index: u32,
}

#[derive(Serialize)]
struct NoteEntry {
    note: String,
    index: u32,
}

#[derive(Serialize)]
struct NoteTablePayload {
    low: String,
    high: String,
    max_index: u32,
    vocabulary: usize,
    entries: Vec<NoteEntry>,
}

#[derive(Serialize)]
struct TrainReportPayload {
    mode: FeatureMode,
    demonstrations: usize,
    counts: Vec<(&'static str, usize)>,
    epochs: usize,
    first_loss: Option<f32>,
    final_loss: Option<f32>,
}

impl TrainReportPayload {
    fn new(trace: &TrainingTrace, demonstrations: &DemonstrationSet) -> Self {
        let counts = demonstrations.counts_by_action();
        Self {
            mode: trace.mode(),
            demonstrations: demonstrations.len(),
            counts: ALL_ACTIONS
                .iter()
                .map(|action| (action.as_str(), counts[action.index()]))
                .collect(),
            epochs: trace.len(),
            first_loss: trace.epochs().first().map(|s| s.loss()),
            final_loss: trace.final_loss(),
        }
    }
}

#[derive(Serialize)]
struct PredictPayload<'a> {
    action: &'static str,
    policy: &'static str,
    probabilities: &'a [f32],
}

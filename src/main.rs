use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sheaf_config::{BatchDef, GroupingStrategy, OrchestratorConfig};
use sheaf_plan::{Policy, group, validate};
use sheaf_runtime::{BatchError, BatchResponse};

/// Sheaf - validate and plan batches of named sub-calls
#[derive(Parser)]
#[command(name = "sheaf")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to an orchestrator configuration file (JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate a batch document against the configured policy
  Check {
    /// Path to the batch document (reads stdin when omitted)
    file: Option<PathBuf>,
  },

  /// Print the execution plan for a batch document
  Plan {
    /// Path to the batch document (reads stdin when omitted)
    file: Option<PathBuf>,

    /// Override the configured grouping strategy
    #[arg(long, value_enum)]
    grouping: Option<Grouping>,
  },

  /// Print the entry point and which methods the policy admits
  Describe {
    /// Path to a JSON array of known method names
    #[arg(long)]
    methods: PathBuf,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum Grouping {
  Leveled,
  Signature,
}

impl From<Grouping> for GroupingStrategy {
  fn from(grouping: Grouping) -> Self {
    match grouping {
      Grouping::Leveled => GroupingStrategy::Leveled,
      Grouping::Signature => GroupingStrategy::Signature,
    }
  }
}

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref())?;

  match cli.command {
    Some(Commands::Check { file }) => check(file.as_deref(), &config),
    Some(Commands::Plan { file, grouping }) => {
      let strategy = grouping.map(Into::into).unwrap_or(config.grouping);
      plan(file.as_deref(), &config, strategy)
    }
    Some(Commands::Describe { methods }) => describe(&methods, &config),
    None => {
      println!("sheaf - use --help to see available commands");
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn check(file: Option<&Path>, config: &OrchestratorConfig) -> Result<ExitCode> {
  let policy = Policy::from_config(config).context("invalid allow/deny pattern in config")?;
  let batch = match read_batch(file)? {
    Ok(batch) => batch,
    Err(e) => return reject(e),
  };

  if let Err(e) = validate(&batch, &policy) {
    return reject(e.into());
  }

  let plan = group(&batch, config.grouping);
  info!(calls = batch.len(), stages = plan.len(), "batch_valid");
  println!("ok: {} calls in {} stages", batch.len(), plan.len());

  Ok(ExitCode::SUCCESS)
}

fn plan(
  file: Option<&Path>,
  config: &OrchestratorConfig,
  strategy: GroupingStrategy,
) -> Result<ExitCode> {
  let policy = Policy::from_config(config).context("invalid allow/deny pattern in config")?;
  let batch = match read_batch(file)? {
    Ok(batch) => batch,
    Err(e) => return reject(e),
  };

  // Grouping is only defined for documents that pass validation.
  if let Err(e) = validate(&batch, &policy) {
    return reject(e.into());
  }

  let plan = group(&batch, strategy);
  println!("{}", serde_json::to_string_pretty(&plan)?);

  Ok(ExitCode::SUCCESS)
}

fn describe(methods_file: &Path, config: &OrchestratorConfig) -> Result<ExitCode> {
  let policy = Policy::from_config(config).context("invalid allow/deny pattern in config")?;

  let content = std::fs::read_to_string(methods_file)
    .with_context(|| format!("failed to read methods file: {}", methods_file.display()))?;
  let mut methods: Vec<String> = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse methods file: {}", methods_file.display()))?;
  methods.sort();
  methods.dedup();

  let permitted = policy.permitted(methods.iter().map(String::as_str));
  debug!(known = methods.len(), permitted = permitted.len(), "methods_described");

  let output = serde_json::json!({
    "entry": config.entry,
    "max_calls": policy.max_calls(),
    "methods": permitted,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(ExitCode::SUCCESS)
}

fn reject(err: BatchError) -> Result<ExitCode> {
  let response = BatchResponse::error(&err);
  println!("{}", serde_json::to_string_pretty(&response.body)?);
  Ok(ExitCode::FAILURE)
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
  match path {
    Some(path) => Ok(OrchestratorConfig::from_path(path)?),
    None => Ok(OrchestratorConfig::default()),
  }
}

/// Read a batch document; a malformed document is a batch error, not a CLI failure.
fn read_batch(file: Option<&Path>) -> Result<Result<BatchDef, BatchError>> {
  let body = match file {
    Some(path) => std::fs::read(path)
      .with_context(|| format!("failed to read batch file: {}", path.display()))?,
    None => read_stdin()?,
  };
  Ok(BatchDef::from_slice(&body).map_err(BatchError::from))
}

fn read_stdin() -> Result<Vec<u8>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    anyhow::bail!("no batch document given: pass a FILE or pipe one on stdin");
  }

  let mut input = Vec::new();
  io::stdin()
    .read_to_end(&mut input)
    .context("failed to read batch document from stdin")?;
  Ok(input)
}

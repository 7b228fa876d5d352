use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use quire_artifact::FsStore;
use quire_builder::{PipelineBuilder, research_workflow};
use quire_config::WorkflowDef;
use quire_pipeline::{ChannelNotifier, Engine, EngineConfig, ExecutionEvent};
use quire_worker::{HttpInvoker, HttpInvokerConfig};

/// Quire - runs staged document pipelines against LLM workers
#[derive(Parser)]
#[command(name = "quire")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.quire)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Increase log verbosity (-v, -vv, -vvv)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Emit logs as JSON
  #[arg(long, global = true)]
  json_logs: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow over a folder of PDF papers
  Run(RunArgs),

  /// Print the built-in research workflow as JSON
  ShowWorkflow,
}

#[derive(clap::Args)]
struct RunArgs {
  /// Workflow definition (JSON). Defaults to the built-in research workflow.
  #[arg(long)]
  workflow: Option<PathBuf>,

  /// Folder containing the input PDFs
  #[arg(long, default_value = "papers")]
  papers: PathBuf,

  /// Folder the artifacts are written to
  #[arg(long, default_value = "outputs")]
  output: PathBuf,

  /// Folder with one instructions file per worker (default: <data-dir>/prompts)
  #[arg(long)]
  prompts: Option<PathBuf>,

  /// Model name sent with every request
  #[arg(long)]
  model: Option<String>,

  /// OpenAI-compatible API root
  #[arg(long)]
  base_url: Option<String>,

  /// Per-request timeout in seconds
  #[arg(long, default_value_t = 300)]
  timeout_secs: u64,

  /// Maximum number of concurrent worker calls
  #[arg(long)]
  max_concurrency: Option<usize>,
}

fn main() -> Result<()> {
  let _ = dotenvy::dotenv();
  let cli = Cli::parse();
  init_tracing(cli.verbose, cli.json_logs);

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".quire"),
  };

  match cli.command {
    Some(Commands::Run(args)) => run(args, data_dir)?,
    Some(Commands::ShowWorkflow) => {
      println!("{}", research_workflow().to_json_pretty()?);
    }
    None => {
      println!("quire - use --help to see available commands");
    }
  }

  Ok(())
}

fn run(args: RunArgs, data_dir: PathBuf) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_async(args, data_dir).await })
}

async fn run_async(args: RunArgs, data_dir: PathBuf) -> Result<()> {
  let workflow_def = match &args.workflow {
    Some(path) => WorkflowDef::from_file(path)
      .with_context(|| format!("failed to load workflow file: {}", path.display()))?,
    None => research_workflow(),
  };
  eprintln!("Loaded workflow: {}", workflow_def.name);

  let documents = quire_ingest::load_documents(&args.papers)
    .await
    .with_context(|| format!("failed to load papers from {}", args.papers.display()))?;
  if documents.is_empty() {
    warn!(papers = %args.papers.display(), "no PDF documents found");
  }
  eprintln!("Loaded {} documents", documents.len());

  let texts: Vec<String> = documents.into_iter().map(|d| d.text).collect();
  let pipeline = PipelineBuilder::new(texts)
    .build(&workflow_def)
    .context("failed to build pipeline")?;

  let mut invoker_config = HttpInvokerConfig {
    api_key: std::env::var("OPENAI_API_KEY").ok(),
    prompts_dir: args.prompts.unwrap_or_else(|| data_dir.join("prompts")),
    timeout: Duration::from_secs(args.timeout_secs),
    ..HttpInvokerConfig::default()
  };
  if let Some(model) = args.model {
    invoker_config.model = model;
  }
  if let Some(base_url) = args.base_url {
    invoker_config.base_url = base_url;
  }
  let invoker = HttpInvoker::new(invoker_config).context("failed to create worker invoker")?;

  let store = Arc::new(FsStore::new(&args.output));
  let context = quire_pipeline::Context::new(store);

  let (notifier, mut events) = ChannelNotifier::channel();
  let progress = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      report_progress(&event);
    }
  });

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      eprintln!("Interrupted, cancelling run");
      on_interrupt.cancel();
    }
  });

  let engine = Engine::with_notifier(
    EngineConfig {
      max_concurrency: args.max_concurrency,
    },
    notifier,
  );
  let result = engine
    .run(&pipeline, context, Arc::new(invoker), cancel)
    .await;

  // The engine owns the only sender; dropping it ends the progress stream.
  drop(engine);
  let _ = progress.await;

  let result = result.context("pipeline run failed")?;

  eprintln!("Execution completed: {}", result.execution_id);
  eprintln!("Artifacts written to {}", args.output.display());
  println!("{}", serde_json::to_string_pretty(&result)?);

  Ok(())
}

fn report_progress(event: &ExecutionEvent) {
  match event {
    ExecutionEvent::StageStarted { stage, steps, .. } => {
      eprintln!("Running {} ({})", stage, steps.join(", "));
    }
    ExecutionEvent::StepFailed { step, error, .. } => {
      eprintln!("  {} failed: {}", step, error);
    }
    ExecutionEvent::StageCompleted { stage, .. } => {
      eprintln!("  {} done", stage);
    }
    _ => {}
  }
}

/// Install the tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbose: u8, json: bool) {
  let base_filter = match std::env::var("RUST_LOG") {
    Ok(filter) => filter,
    Err(_) => match verbose {
      0 => "warn".to_string(),
      1 => "warn,quire=info,quire_pipeline=info".to_string(),
      2 => "info,quire_pipeline=debug,quire_worker=debug,quire_ingest=debug".to_string(),
      _ => "debug,quire_pipeline=trace,quire_worker=trace".to_string(),
    },
  };

  let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

  if json {
    tracing_subscriber::registry()
      .with(filter)
      .with(fmt::layer().json().with_writer(std::io::stderr))
      .init();
  } else {
    tracing_subscriber::registry()
      .with(filter)
      .with(
        fmt::layer()
          .with_target(true)
          .with_writer(std::io::stderr)
          .compact(),
      )
      .init();
  }
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use sentence_classifier::client::{Classifier, OpenAiClient};
use sentence_classifier::config::{load_instructions, ConfigLoader};
use sentence_classifier::pipeline::{merge_run, PipelineRunner, ShutdownSignal};
use sentence_classifier::reconcile::{reconcile_files, ReconcileOptions};
use sentence_classifier::table::InputTable;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Classify sentences against a chat-completions service in resumable chunks
#[derive(Parser)]
#[command(name = "sentence-classifier")]
#[command(about = "Resumable, chunked, parallel sentence classification", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every unit of the configured input table
    Run {
        /// Path to the run configuration (TOML)
        #[arg(short = 'c', long)]
        config: PathBuf,

        /// Resume an existing run folder instead of starting a new one
        #[arg(long)]
        run_dir: Option<PathBuf>,

        /// Units per chunk (overrides batch.chunk_size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Maximum in-flight requests (overrides batch.max_workers)
        #[arg(short = 'w', long)]
        workers: Option<usize>,

        /// Do not merge chunk documents when the run finishes
        #[arg(long)]
        no_merge: bool,
    },
    /// Merge the chunk documents of a run folder
    Merge {
        /// Run folder holding the per-chunk documents
        #[arg(long)]
        run_dir: PathBuf,

        /// Where merged tables are written (default: the run folder)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Attach merged labels to the original input rows
    Reconcile {
        /// Original input table
        #[arg(long)]
        input: PathBuf,

        /// Merged classified table
        #[arg(long)]
        classified: PathBuf,

        /// Output table
        #[arg(long)]
        output: PathBuf,

        /// Key column in the original table
        #[arg(long, default_value = "id")]
        key_column: String,

        /// Sentence id column in the classified table
        #[arg(long, default_value = "id")]
        id_field: String,

        /// Suffix appended to model columns
        #[arg(long, default_value = "_model")]
        suffix: String,

        /// Separator between the original key and the sequence key
        #[arg(long, default_value = "_")]
        separator: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,reqwest=debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("sentence-classifier started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Run {
            config,
            run_dir,
            chunk_size,
            workers,
            no_merge,
        } => run_classification(config, run_dir, chunk_size, workers, no_merge).await,
        Commands::Merge {
            run_dir,
            output_dir,
        } => run_merge(run_dir, output_dir),
        Commands::Reconcile {
            input,
            classified,
            output,
            key_column,
            id_field,
            suffix,
            separator,
        } => {
            let options = ReconcileOptions {
                key_column,
                id_field,
                suffix,
                separator,
            };
            reconcile_files(&input, &classified, &output, &options)
                .map(|_| ())
                .map_err(Into::into)
        }
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run_classification(
    config_path: PathBuf,
    run_dir: Option<PathBuf>,
    chunk_size: Option<usize>,
    workers: Option<usize>,
    no_merge: bool,
) -> anyhow::Result<()> {
    let mut config = ConfigLoader::new(&config_path).load().await?;
    if let Some(size) = chunk_size {
        config.batch.chunk_size = size;
    }
    if let Some(workers) = workers {
        config.batch.max_workers = workers;
    }
    config.validate()?;

    let instructions = load_instructions(&config.prompt.path).await?;
    let table = InputTable::from_path(&config.input.path)?;
    info!(
        "Loaded {} rows from {}",
        table.len(),
        config.input.path.display()
    );

    let run_dir = run_dir.unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        config.output.root.join(format!("run_{stamp}"))
    });
    info!("Run folder: {}", run_dir.display());

    if config.model.api_key().is_none() {
        warn!(
            "Environment variable {} is not set; requests will be sent without credentials",
            config.model.api_key_env
        );
    }
    let client: Arc<dyn Classifier> = Arc::new(OpenAiClient::from_config(&config.model)?);

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrl_c_handler();

    let runner = PipelineRunner::new(&config, instructions, client, &run_dir).with_shutdown(shutdown);
    let summary = runner
        .run(&table, &config.input)
        .await
        .with_context(|| format!("Run in {} stopped", run_dir.display()))?;

    if !summary.is_complete() {
        warn!(
            "Run interrupted; resume with --run-dir {}",
            run_dir.display()
        );
        return Ok(());
    }

    if no_merge {
        info!("Skipping merge (--no-merge)");
        return Ok(());
    }

    merge_run(&run_dir, &run_dir)?;
    Ok(())
}

fn run_merge(run_dir: PathBuf, output_dir: Option<PathBuf>) -> anyhow::Result<()> {
    if !run_dir.is_dir() {
        anyhow::bail!("Run folder {} does not exist", run_dir.display());
    }
    let output_dir = output_dir.unwrap_or_else(|| run_dir.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let report = merge_run(&run_dir, &output_dir)?;
    if report.structured.is_none() {
        warn!("Nothing to merge in {}", run_dir.display());
    }
    Ok(())
}

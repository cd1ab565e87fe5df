use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use plaint::classifier::{GateVerdict, load_labeled_jsonl, train};
use plaint::models::SentimentLabel;
use plaint::{
    BatchPacing, GeminiClient, GeminiConfig, JsonlSink, LinearTextModel, LocalConfidenceGate,
    PipelineConfig, PipelineOrchestrator, ResilientCallClient, ScenarioCatalog, TokioSleeper,
    TrainConfig, collect_inputs, run_batch,
};

#[derive(Parser)]
#[command(name = "plaint")]
#[command(author, version, about = "Cost-aware complaint classification pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify audio recordings and text files
    Process {
        /// Input file or folder
        #[arg(short, long)]
        input: PathBuf,

        /// Scenario catalog (JSON array of {id, name, description})
        #[arg(short, long)]
        scenarios: PathBuf,

        /// Output file for classified records (JSON lines, appended)
        #[arg(short, long)]
        output: PathBuf,

        /// Local classifier artifact (overrides CLASSIFIER_MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Pause after each text record, in seconds
        #[arg(long, default_value = "2")]
        text_delay_secs: u64,

        /// Pause after each audio record, in seconds
        #[arg(long, default_value = "10")]
        audio_delay_secs: u64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Train the local complaint classifier from labeled JSONL
    Train {
        /// Labeled rows of {"text": ..., "label": ...}
        #[arg(short, long)]
        data: PathBuf,

        /// Where to write the model artifact
        #[arg(short, long, default_value = plaint::config::DEFAULT_CLASSIFIER_PATH)]
        output: PathBuf,

        /// Minimum number of labeled rows
        #[arg(long, default_value = "50")]
        min_examples: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Score one text with the local classifier, without calling the API
    Score {
        /// Local classifier artifact (overrides CLASSIFIER_MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Text to score
        #[arg(short, long)]
        text: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            scenarios,
            output,
            model,
            text_delay_secs,
            audio_delay_secs,
            verbose,
        } => {
            setup_logging(verbose);
            let pacing = BatchPacing {
                text_delay: Duration::from_secs(text_delay_secs),
                audio_delay: Duration::from_secs(audio_delay_secs),
            };
            until_interrupted(
                process_inputs(input, scenarios, output, model, pacing),
                tokio::signal::ctrl_c(),
            )
            .await
        }
        Commands::Train {
            data,
            output,
            min_examples,
            verbose,
        } => {
            setup_logging(verbose);
            train_classifier(data, output, min_examples)
        }
        Commands::Score {
            model,
            text,
            verbose,
        } => {
            setup_logging(verbose);
            score_text(model, &text)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Run `work` unless `interrupt` fires first; an interruption is an error so
/// the exit status shows the batch did not finish
async fn until_interrupted<W, I>(work: W, interrupt: I) -> Result<()>
where
    W: Future<Output = Result<()>>,
    I: Future,
{
    tokio::select! {
        result = work => result,
        _ = interrupt => {
            warn!("Interrupted, stopping");
            bail!("Interrupted before the batch finished")
        }
    }
}

async fn process_inputs(
    input: PathBuf,
    scenarios: PathBuf,
    output: PathBuf,
    model: Option<PathBuf>,
    pacing: BatchPacing,
) -> Result<()> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(model) = model {
        config.classifier_path = model;
    }

    let catalog = ScenarioCatalog::from_file(&scenarios)?;
    info!("Loaded {} scenarios from {:?}", catalog.len(), scenarios);

    let paths = collect_inputs(&input)?;
    if paths.is_empty() {
        info!("No supported files found under {:?}", input);
        return Ok(());
    }
    info!("Found {} files to process", paths.len());

    let api_config = GeminiConfig::from_env()?;
    let client = GeminiClient::new(api_config);
    info!("Using model {}", client.model());
    let caller = ResilientCallClient::new(Arc::new(client));

    let gate = LocalConfidenceGate::load(&config.classifier_path, config.band);
    let sink = JsonlSink::new(output);
    let orchestrator = PipelineOrchestrator::new(&caller, &gate, &catalog, &sink, &config);

    let summary = run_batch(&orchestrator, &paths, &pacing, &TokioSleeper).await;

    info!("Records written to {:?}", sink.path());
    if summary.stopped_on_quota {
        bail!(
            "Daily quota exhausted; {} files were not processed",
            summary.skipped
        );
    }
    Ok(())
}

fn train_classifier(data: PathBuf, output: PathBuf, min_examples: usize) -> Result<()> {
    info!("Loading labeled data from {:?}", data);
    let examples = load_labeled_jsonl(&data)?;
    let complaints = examples.iter().filter(|e| e.is_complaint).count();
    info!(
        "Loaded {} rows ({} complaints, {} non-complaints)",
        examples.len(),
        complaints,
        examples.len() - complaints
    );

    let config = TrainConfig {
        min_examples,
        ..Default::default()
    };
    let outcome = train(&examples, &config)?;

    outcome
        .model
        .save(&output)
        .with_context(|| format!("Failed to save model to {:?}", output))?;

    println!("Held-out evaluation ({} rows)", outcome.test_size);
    println!("==============================");
    println!("{}", outcome.evaluation);
    println!();
    println!(
        "Model saved to {:?} ({} features, trained on {} rows)",
        output,
        outcome.model.vectorizer.len(),
        outcome.train_size
    );
    Ok(())
}

fn score_text(model: Option<PathBuf>, text: &str) -> Result<()> {
    let config = PipelineConfig::from_env()?;
    let path = model.unwrap_or(config.classifier_path);

    let model = LinearTextModel::load(&path)
        .with_context(|| format!("Failed to load classifier from {:?}", path))?;
    let gate = LocalConfidenceGate::new(Arc::new(model), config.band);

    match gate.evaluate(text) {
        GateVerdict::Scored(verdict) => {
            println!("Label: {}", SentimentLabel::from(verdict.label));
            println!("p(complaint): {:.4}", verdict.probability);
            println!("Score: {}", verdict.score());
            println!(
                "Escalate: {} (band [{}, {}])",
                gate.needs_escalation(verdict.probability),
                config.band.low,
                config.band.high
            );
        }
        GateVerdict::Unavailable(reason) => {
            println!("Classifier could not score this text: {}", reason);
            println!("Escalate: true");
        }
    }
    Ok(())
}

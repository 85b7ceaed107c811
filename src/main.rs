//! doc-overlay - Document analysis result annotator
//!
//! Reads analysis results produced by a document-analysis service, draws
//! confidence-coded overlays onto page images and writes summaries and exports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use doc_overlay::annotate::ElementFilter;
use doc_overlay::app::{DocumentPipeline, DocumentReport};
use doc_overlay::batch::run_jobs;
use doc_overlay::config::{save_config, AppConfig};
use doc_overlay::storage::{self, BatchInput, ReportOutputs};
use doc_overlay::{sorted_by_confidence_desc, ConfidenceClassifier, DocumentModelKind, SourceKind};

/// doc-overlay - Confidence-coded annotation of document analysis results
#[derive(Parser, Debug)]
#[command(name = "doc-overlay")]
#[command(about = "Normalize document analysis results and render annotation overlays")]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate one page image and export its elements
    Annotate {
        /// Analysis result JSON
        result: PathBuf,
        /// Page image to draw on
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Document model (name or model id); detected from the result when omitted
        #[arg(short, long)]
        model: Option<String>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Page of the result the image shows
        #[arg(long)]
        page: Option<u32>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print statistics and the confidence legend for a result
    Summary {
        result: PathBuf,
        #[arg(short, long)]
        model: Option<String>,
        /// Number of highest-confidence elements to list
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Process every `<name>.json` in a directory, with `<name>.<png|jpg|...>` images when present
    Batch {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        model: Option<String>,
        /// Worker threads (overrides the config file)
        #[arg(short, long)]
        workers: Option<usize>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List supported document models
    Models,
    /// Write the default configuration file
    InitConfig {
        /// Destination (defaults to the user config directory)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Which elements to draw
#[derive(clap::Args, Debug, Default)]
struct FilterArgs {
    /// Label pattern to draw, `*` as wildcard (repeatable)
    #[arg(long = "label")]
    labels: Vec<String>,
    /// Element kind to draw (repeatable)
    #[arg(long = "kind", value_enum)]
    kinds: Vec<KindArg>,
    /// Skip elements below this confidence
    #[arg(long)]
    min_confidence: Option<f64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Field,
    TableCell,
    KeyValuePair,
    SelectionMark,
}

impl From<KindArg> for SourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Field => SourceKind::Field,
            KindArg::TableCell => SourceKind::TableCell,
            KindArg::KeyValuePair => SourceKind::KeyValuePair,
            KindArg::SelectionMark => SourceKind::SelectionMark,
        }
    }
}

impl FilterArgs {
    fn to_filter(&self) -> ElementFilter {
        let mut filter = ElementFilter::all()
            .with_labels(self.labels.iter().cloned())
            .with_kinds(self.kinds.iter().copied().map(SourceKind::from));
        if let Some(min) = self.min_confidence {
            filter = filter.with_min_confidence(min);
        }
        filter
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Models => {
            list_models();
            Ok(())
        }
        Command::InitConfig { path, force } => init_config(path, force),
        Command::Annotate {
            result,
            image,
            model,
            output,
            page,
            filter,
        } => {
            let mut config = storage::resolve_config(args.config.as_deref())?;
            if let Some(page) = page {
                config.render.page_number = page;
            }
            run_annotate(&config, &result, image.as_deref(), model.as_deref(), &output, &filter.to_filter())
        }
        Command::Summary { result, model, top } => {
            let config = storage::resolve_config(args.config.as_deref())?;
            run_summary(&config, &result, model.as_deref(), top)
        }
        Command::Batch {
            input,
            output,
            model,
            workers,
            filter,
        } => {
            let mut config = storage::resolve_config(args.config.as_deref())?;
            if let Some(workers) = workers {
                config.batch.workers = workers;
            }
            run_batch(&config, &input, &output, model.as_deref(), &filter.to_filter())
        }
    }
}

fn parse_model(model: Option<&str>) -> Result<Option<DocumentModelKind>> {
    model
        .map(|m| m.parse::<DocumentModelKind>())
        .transpose()
        .context("Unsupported document model")
}

fn list_models() {
    println!("Supported document models:");
    for kind in DocumentModelKind::ALL {
        println!("  {:<12} {:<22} {}", kind.name(), kind.model_id(), kind.description());
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => storage::default_config_path()?,
    };
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }
    save_config(&AppConfig::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Process one document and write its image, CSV and JSON outputs
fn process_to_outputs(
    pipeline: &DocumentPipeline,
    name: &str,
    result_path: &Path,
    image_path: Option<&Path>,
    kind: Option<DocumentModelKind>,
    output_dir: &Path,
    filter: &ElementFilter,
) -> Result<DocumentReport> {
    let outputs = ReportOutputs::for_document(output_dir, name);
    let inputs: Vec<&Path> = std::iter::once(result_path).chain(image_path).collect();
    outputs.check_not_overwriting(&inputs)?;

    let raw = storage::load_raw_result(result_path)?;
    let image = image_path.map(storage::load_image).transpose()?;

    let report = pipeline
        .process(raw, kind, image.as_ref(), filter)
        .with_context(|| format!("Failed to process {:?}", result_path))?;

    storage::write_report_outputs(&report, &outputs)?;

    for diagnostic in &report.diagnostics {
        warn!("{}: {}", name, diagnostic);
    }
    Ok(report)
}

fn run_annotate(
    config: &AppConfig,
    result: &Path,
    image: Option<&Path>,
    model: Option<&str>,
    output: &Path,
    filter: &ElementFilter,
) -> Result<()> {
    let pipeline = DocumentPipeline::from_config(config)?;
    let kind = parse_model(model)?;
    let name = file_stem(result);

    let report = process_to_outputs(&pipeline, &name, result, image, kind, output, filter)?;
    print_summary(&report, pipeline.classifier());
    if image.is_some() {
        println!("Drew {} elements into {}", report.drawn, output.display());
    }
    Ok(())
}

fn run_summary(config: &AppConfig, result: &Path, model: Option<&str>, top: usize) -> Result<()> {
    let pipeline = DocumentPipeline::from_config(config)?;
    let raw = storage::load_raw_result(result)?;
    let report = pipeline.process(raw, parse_model(model)?, None, &ElementFilter::all())?;

    print_summary(&report, pipeline.classifier());

    println!();
    println!("Top elements by confidence:");
    for element in sorted_by_confidence_desc(&report.elements).into_iter().take(top) {
        let confidence = element
            .confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        println!("  {:>5}  {:<32} {}", confidence, element.label, element.value);
    }

    for diagnostic in &report.diagnostics {
        warn!("{}", diagnostic);
    }
    Ok(())
}

fn run_batch(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    model: Option<&str>,
    filter: &ElementFilter,
) -> Result<()> {
    let pipeline = DocumentPipeline::from_config(config)?;
    let kind = parse_model(model)?;
    let inputs = storage::discover_batch_inputs(input)?;
    if inputs.is_empty() {
        warn!("No analysis results found in {:?}", input);
        return Ok(());
    }
    info!("Processing {} documents with {} workers", inputs.len(), config.batch.workers);

    let results = run_jobs(inputs, config.batch.workers, |job: BatchInput| {
        let report = process_to_outputs(
            &pipeline,
            &job.name,
            &job.result_path,
            job.image_path.as_deref(),
            kind,
            output,
            filter,
        );
        (job.name, report)
    });

    let mut failed = 0;
    for (name, report) in &results {
        match report {
            Ok(report) => println!(
                "  {:<24} {:<12} {:>4} elements  {:>3} drawn  {:>3} warnings",
                name,
                report.kind.name(),
                report.summary.total,
                report.drawn,
                report.diagnostics.len()
            ),
            Err(e) => {
                failed += 1;
                println!("  {:<24} FAILED: {:#}", name, e);
            }
        }
    }
    println!("{} documents, {} failed", results.len(), failed);
    Ok(())
}

fn print_summary(report: &DocumentReport, classifier: &ConfidenceClassifier) {
    let summary = &report.summary;
    let percent = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |c| format!("{:.1}%", c * 100.0));

    println!("Document model:     {}", report.kind);
    println!("Total elements:     {}", summary.total);
    println!("With geometry:      {}", summary.with_geometry);
    println!("Mean confidence:    {}", percent(summary.mean_confidence));
    println!("Median confidence:  {}", percent(summary.median_confidence));
    println!(
        "Range:              {} - {}",
        percent(summary.min_confidence),
        percent(summary.max_confidence)
    );
    for kind in SourceKind::ALL {
        let count = summary.count_of_kind(kind);
        if count > 0 {
            println!("  {:<18}{}", kind.as_str(), count);
        }
    }

    println!();
    println!("Confidence legend:");
    for entry in &report.breakdown {
        println!(
            "  {:<18} {:<8} {:>4}  ({:.1}%)",
            entry.label,
            entry.color.as_str(),
            entry.count,
            entry.percentage
        );
    }
    if !report.tables.is_empty() {
        let color = &classifier.colors().table;
        println!("  {:<18} {:<8} {:>4}", "Tables", color.as_str(), report.tables.len());
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

//! Deckweave CLI
//!
//! The `deckweave` command enriches a presentation outline with generated
//! content.
//!
//! ## Commands
//!
//! - `enrich`: Generate content for every slide and validate it
//! - `plan`: Show the generation requests an enrichment would send
//! - `parse-guidance`: Parse a `Goal: .., Content: .., Style: ..` string
//! - `layouts`: List the built-in layout catalog

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use deckweave_core::{
    builtin_catalog, has_valid_guidance, infer_assignments, parse_guidance, EnrichConfig,
    EnrichmentResult, GeneratorRegistry, LayoutAssignment, LayoutSpecs, Orchestrator,
    PresentationOutline, ProgressSink, METRICS,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "deckweave")]
#[command(author = "Deckweave Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Enrich presentation outlines with generated content", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich an outline and write the result as JSON
    Enrich {
        #[command(flatten)]
        input: InputArgs,

        /// Which generators to use
        #[arg(long, value_enum, default_value = "stub")]
        backend: Backend,

        /// Maximum requests in flight (default: unbounded)
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Retries for transport failures and timeouts
        #[arg(long)]
        max_retries: Option<u32>,

        /// JSON config file (default: built-in defaults plus DECKWEAVE_* env)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit non-zero when any slide has a critical violation
        #[arg(long)]
        fail_on_violations: bool,
    },

    /// Print the generation requests for an outline without sending them
    Plan {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Parse a guidance string and print its parts
    ParseGuidance {
        /// Guidance text, e.g. "Goal: Show trend, Content: Q3 revenue, Style: Line chart"
        text: String,
    },

    /// List the built-in layout catalog
    Layouts,
}

#[derive(clap::Args, Debug)]
struct InputArgs {
    /// Presentation outline (JSON)
    #[arg(long)]
    outline: PathBuf,

    /// Layout assignments (JSON array of {slide_id, layout_id})
    #[arg(long, conflicts_with = "auto_layout")]
    assignments: Option<PathBuf>,

    /// Layout specifications (JSON object keyed by layout id)
    #[arg(long)]
    layouts: Option<PathBuf>,

    /// Assign built-in layouts from each slide's type
    #[arg(long)]
    auto_layout: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Deterministic in-process generators
    Stub,
    /// HTTP services configured by <TYPE>_SERVICE_URL
    Http,
}

/// Everything an enrichment run reads from disk.
struct Inputs {
    outline: PresentationOutline,
    assignments: Option<Vec<LayoutAssignment>>,
    specs: Option<LayoutSpecs>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    deckweave_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Enrich {
            input,
            backend,
            max_concurrency,
            timeout_ms,
            max_retries,
            config,
            output,
            fail_on_violations,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(n) = max_concurrency {
                config.dispatch.max_concurrency = (n > 0).then_some(n);
            }
            if let Some(ms) = timeout_ms {
                config.dispatch.request_timeout_ms = (ms > 0).then_some(ms);
            }
            if let Some(n) = max_retries {
                config.dispatch.retry.max_retries = n;
            }
            cmd_enrich(&input, backend, config, output.as_deref(), fail_on_violations).await
        }
        Commands::Plan { input } => cmd_plan(&input),
        Commands::ParseGuidance { text } => cmd_parse_guidance(&text),
        Commands::Layouts => cmd_layouts(),
    }
}

/// Run a full enrichment. Ctrl-C cancels outstanding requests and still
/// writes the partial result.
async fn cmd_enrich(
    input: &InputArgs,
    backend: Backend,
    config: EnrichConfig,
    output: Option<&Path>,
    fail_on_violations: bool,
) -> Result<()> {
    let inputs = load_inputs(input)?;
    let registry = build_registry(backend)?;
    let orchestrator = Orchestrator::new(registry, config);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling outstanding requests");
            let _ = cancel_tx.send(true);
        }
    });

    let progress: Arc<dyn ProgressSink> =
        Arc::new(|message: &str, completed: usize, total: usize| {
            eprintln!("  {completed:>3}/{total:<3} {message}");
        });

    info!(
        title = %inputs.outline.title,
        slides = inputs.outline.slides.len(),
        backend = ?backend,
        "Enriching outline"
    );
    let result = orchestrator
        .enrich_until(
            &inputs.outline,
            inputs.assignments.as_deref(),
            inputs.specs.as_ref(),
            Some(progress),
            cancel_rx,
        )
        .await
        .context("Enrichment rejected its input")?;

    write_json(&result, output)?;
    print_summary(&result);
    METRICS.flush();

    if fail_on_violations && !result.validation_report.overall_compliant {
        bail!(
            "{} critical violation(s) across {} slide(s)",
            result.validation_report.critical_violations,
            result.validation_report.total_slides - result.validation_report.compliant_slides
        );
    }
    Ok(())
}

fn cmd_plan(input: &InputArgs) -> Result<()> {
    let inputs = load_inputs(input)?;
    let orchestrator = Orchestrator::new(GeneratorRegistry::stubbed(), EnrichConfig::from_env());
    let requests = orchestrator
        .plan(
            &inputs.outline,
            inputs.assignments.as_deref(),
            inputs.specs.as_ref(),
        )
        .context("Cannot plan enrichment")?;

    println!("{} requests for {} slides", requests.len(), inputs.outline.slides.len());
    for request in &requests {
        println!(
            "  slide {:>2} {:<12} {}",
            request.slide_number,
            request.slide_id,
            request.content_type()
        );
    }
    Ok(())
}

fn cmd_parse_guidance(text: &str) -> Result<()> {
    let guidance = parse_guidance(Some(text));
    write_json(&guidance, None)?;
    if !has_valid_guidance(Some(text)) {
        warn!("no Goal/Content/Style labels found; this guidance would not trigger generation");
    }
    Ok(())
}

fn cmd_layouts() -> Result<()> {
    println!("Built-in layouts");
    println!("================");
    for (id, spec) in builtin_catalog() {
        println!();
        println!("{id}  {}", spec.name);
        for region in &spec.regions {
            let mut limits = Vec::new();
            if let Some(range) = region.word_range {
                limits.push(format!("{}-{} words", range.min, range.max));
            }
            if let Some(max) = region.max_characters {
                limits.push(format!("<= {max} chars"));
            }
            if let Some(ratio) = &region.aspect_ratio {
                limits.push(ratio.clone());
            }
            println!(
                "  - {:<8} {:<9} {}",
                region.content_type.to_string(),
                if region.required { "required" } else { "optional" },
                limits.join(", ")
            );
        }
    }
    Ok(())
}

fn build_registry(backend: Backend) -> Result<GeneratorRegistry> {
    match backend {
        Backend::Stub => Ok(GeneratorRegistry::stubbed()),
        Backend::Http => deckweave_backends::http_registry_from_env()
            .context("Failed to configure HTTP generators"),
    }
}

fn load_config(path: Option<&Path>) -> Result<EnrichConfig> {
    let base = match path {
        Some(path) => EnrichConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EnrichConfig::default(),
    };
    Ok(base.with_env_overrides(|key| std::env::var(key).ok()))
}

fn load_inputs(input: &InputArgs) -> Result<Inputs> {
    let outline: PresentationOutline = read_json(&input.outline)?;

    let mut specs: Option<LayoutSpecs> = input.layouts.as_deref().map(read_json).transpose()?;
    let assignments = if input.auto_layout {
        if specs.is_none() {
            specs = Some(builtin_catalog());
        }
        Some(infer_assignments(&outline))
    } else {
        input.assignments.as_deref().map(read_json).transpose()?
    };

    Ok(Inputs {
        outline,
        assignments,
        specs,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote enrichment result");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_summary(result: &EnrichmentResult) {
    let meta = &result.generation_metadata;
    let report = &result.validation_report;
    eprintln!();
    eprintln!(
        "Generated {}/{} items in {} ms{}",
        meta.successful_items,
        meta.total_api_requests,
        meta.generation_time_ms,
        if meta.cancelled { " (cancelled)" } else { "" }
    );
    eprintln!(
        "Compliant slides: {}/{} ({} violations, {} critical)",
        report.compliant_slides,
        report.total_slides,
        report.total_violations,
        report.critical_violations
    );
    for failure in &meta.failures {
        eprintln!(
            "  failed: {} {} ({}): {}",
            failure.slide_id, failure.content_type, failure.kind, failure.message
        );
    }
}

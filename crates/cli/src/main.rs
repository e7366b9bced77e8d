//! Newsloom CLI entry point.
//!
//! One command: give it a topic, get a digest. Runs the full pipeline
//! (scrape, process, summarize, then the quality refinement loop), prints
//! live progress from the event bus, and optionally saves the result.

use std::sync::Arc;

use clap::Parser;
use newsloom_config::{ConfigError, DigestConfig};
use newsloom_core::event::{EventBus, PipelineEvent};
use newsloom_pipeline::DigestPipeline;
use newsloom_providers::GeminiProvider;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(
    name = "newsloom",
    about = "Agentic news digests with a quality refinement loop",
    version,
    author
)]
struct Cli {
    /// Topic to build a digest for
    topic: String,

    /// Save the digest to this file after the run
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Load configuration from this file instead of the default locations
    #[arg(long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => DigestConfig::load_from_with_env(path),
        None => DigestConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    tracing::debug!(?config, "Loaded configuration");

    // Check for API key early and give a clear error
    if let Err(e) = config.validate() {
        if matches!(e, ConfigError::MissingApiKey) {
            eprintln!();
            eprintln!("  ERROR: No API key configured!");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    GOOGLE_API_KEY=...     (recommended)");
            eprintln!("    NEWSLOOM_API_KEY=...   (generic)");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!(
                "    {}",
                DigestConfig::config_dir().join("config.toml").display()
            );
            eprintln!();
            eprintln!("  Get a Gemini key at: https://makersuite.google.com/app/apikey");
            eprintln!();
            return Err("No API key found. See above for setup instructions.".into());
        }
        return Err(format!("Invalid configuration: {e}").into());
    }

    let api_key = config.api_key.clone().ok_or("No API key found")?;
    let provider = Arc::new(GeminiProvider::new(api_key));
    let tools = Arc::new(newsloom_tools::default_registry());

    let event_bus = EventBus::default();
    let pipeline = DigestPipeline::new(config.clone(), provider, tools)
        .map_err(|e| format!("Failed to build pipeline: {e}"))?
        .with_event_bus(event_bus.clone());

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║           Newsloom Digest Pipeline           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Topic:       {}", cli.topic);
    println!("  Worker:      {}", config.worker_model);
    println!("  Critic:      {}", config.critic_model);
    println!("  Articles:    up to {}", config.max_articles);
    println!(
        "  Quality bar: {}/100 within {} passes",
        config.quality_threshold, config.max_quality_iterations
    );
    println!();

    let mut events = event_bus.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => render_event(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let report = pipeline
        .run(&cli.topic)
        .await
        .map_err(|e| format!("Pipeline failed: {e}"))?;

    println!();
    println!("  ──────────────────────────────────────────────");
    println!();
    println!("{}", report.digest);
    println!();
    println!("  ──────────────────────────────────────────────");
    println!();
    match report.quality_score {
        Some(score) => println!(
            "  Quality: {score:.0}/100, {} after {} pass{}",
            if report.quality_approved {
                "approved"
            } else {
                "not approved"
            },
            report.passes,
            if report.passes == 1 { "" } else { "es" },
        ),
        None => println!("  Quality: no verdict recorded"),
    }
    if let Some(reason) = &report.termination_reason {
        println!("  Stopped early: {reason}");
    }

    if let Some(output) = &cli.output {
        let outcome = pipeline
            .save_to(&report.digest, output)
            .await
            .map_err(|e| format!("Save failed: {e}"))?;
        if outcome.success {
            println!("  {}", outcome.message);
        } else {
            eprintln!("  [Save error] {}", outcome.message);
        }
    }

    // Dropping every bus handle closes the channel and lets the progress
    // task drain and exit.
    drop(pipeline);
    drop(event_bus);
    progress.await?;

    println!();
    Ok(())
}

fn render_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StageStarted { stage, .. } => {
            println!("  ▸ {stage}...");
        }
        PipelineEvent::StageCompleted {
            stage,
            terminated,
            duration_ms,
            ..
        } => {
            if *terminated {
                println!("  ✓ {stage} signalled stop ({duration_ms} ms)");
            } else {
                println!("  ✓ {stage} ({duration_ms} ms)");
            }
        }
        PipelineEvent::PassStarted {
            pass, max_passes, ..
        } => {
            println!();
            println!("  Refinement pass {pass}/{max_passes}");
        }
        PipelineEvent::LoopFinished { passes, reason, .. } => match reason {
            Some(reason) => println!("  Loop finished: {reason} ({passes} passes)"),
            None => println!("  Loop finished: pass cap reached ({passes} passes)"),
        },
        PipelineEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => {
            let status = if *success { "ok" } else { "failed" };
            println!("    tool {tool_name}: {status} ({duration_ms} ms)");
        }
        PipelineEvent::DigestSaved { .. } => {}
    }
}

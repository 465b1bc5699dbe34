//! Synaptic CLI
//!
//! Runs the relationship engine against a JSON graph file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use synaptic_core::{EngineConfig, GraphView, RunResult};
use synaptic_runtime::{build_strategies, EngineError, RelationshipEngine, RunResponse};
use synaptic_store::InMemoryGraphStore;
use synaptic_strategies::{
    create_anthropic_backend, create_backend, create_embedder, AnthropicConfig,
    OpenAIBackendConfig, SharedBackend, SharedEmbedder,
};

#[derive(Parser)]
#[command(name = "synaptic")]
#[command(author, version, about = "Synaptic: relationship engine for personal knowledge graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true, env = "SYNAPTIC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze specific entities, or the whole graph
    OnDemand {
        #[command(flatten)]
        run: RunArgs,

        /// Entity ids to analyze (comma-separated; default: whole graph)
        #[arg(short, long, value_delimiter = ',')]
        entity_ids: Vec<String>,
    },

    /// Nightly consolidation: reinforce, decay and prune
    Nightly {
        #[command(flatten)]
        run: RunArgs,

        /// Analyze every entity instead of those changed since the last run
        #[arg(long)]
        full_scan: bool,
    },

    /// Analyze the entities extracted from one capture
    Capture {
        #[command(flatten)]
        run: RunArgs,

        /// Capture id
        capture_id: String,
    },

    /// Validate the configuration and print the effective values
    ValidateConfig,

    /// Show graph statistics
    Stats {
        /// Graph file (JSON snapshot)
        #[arg(short, long)]
        graph: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Graph file (JSON snapshot); updated in place after the run
    #[arg(short, long)]
    graph: PathBuf,

    /// Do not write the graph back
    #[arg(long)]
    dry_run: bool,

    /// Print the run response as JSON
    #[arg(long)]
    json: bool,

    /// Maximum runtime in seconds (0 = unlimited)
    #[arg(long, default_value = "600")]
    timeout: u64,

    #[command(flatten)]
    llm: LlmArgs,
}

#[derive(Args)]
struct LlmArgs {
    /// LLM model for the semantic strategy
    #[arg(short, long, default_value = "claude-sonnet-4-20250514")]
    model: String,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_key: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenRouter API key (or set OPENROUTER_API_KEY env var)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    openrouter_key: Option<String>,

    /// Use OpenAI instead of Anthropic
    #[arg(long)]
    openai: bool,

    /// Use OpenRouter instead of Anthropic
    #[arg(long)]
    openrouter: bool,

    /// Skip the semantic (LLM) strategy
    #[arg(long)]
    no_llm: bool,

    /// Enable the embedding similarity strategy (uses the OpenAI key)
    #[arg(long)]
    embeddings: bool,

    /// Embedding model
    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::OnDemand { run, entity_ids } => {
            let ids = (!entity_ids.is_empty()).then_some(entity_ids);
            execute(config, run, |engine| {
                Box::pin(async move { engine.run_on_demand(ids).await })
            })
            .await?;
        }
        Commands::Nightly { run, full_scan } => {
            execute(config, run, move |engine| {
                Box::pin(async move { engine.run_nightly(full_scan).await })
            })
            .await?;
        }
        Commands::Capture { run, capture_id } => {
            execute(config, run, |engine| {
                Box::pin(async move { engine.run_for_capture(&capture_id).await })
            })
            .await?;
        }
        Commands::ValidateConfig => {
            println!("✅ Configuration is valid\n");
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Stats { graph } => {
            show_stats(&graph)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

type RunFuture<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<RunResult, EngineError>> + 'a>>;

/// Load the graph, run the engine once, save the graph, report
async fn execute<F>(config: EngineConfig, args: RunArgs, run: F) -> Result<()>
where
    F: for<'a> FnOnce(&'a RelationshipEngine) -> RunFuture<'a>,
{
    let store = Arc::new(
        InMemoryGraphStore::load_json(&args.graph)
            .with_context(|| format!("Failed to load graph from {}", args.graph.display()))?,
    );

    let backend = create_llm_backend(&args.llm)?;
    let embedder = create_llm_embedder(&args.llm)?;
    let strategies = build_strategies(&config, backend, embedder);
    let engine = RelationshipEngine::new(config, store.clone(), strategies)?;

    if !args.json {
        println!("🧠 Synaptic - relationship engine\n");
        println!("📂 Graph: {} ({} entities, {} edges)", args.graph.display(), store.entity_count(), store.edge_count());
        println!("🔍 Strategies: {}", engine.strategy_names().join(", "));
        println!("⏱️  Timeout: {}\n", if args.timeout > 0 { format!("{}s", args.timeout) } else { "none".to_string() });
    }

    // A run that hits the timeout keeps every write it already made
    let outcome = if args.timeout > 0 {
        match tokio::time::timeout(Duration::from_secs(args.timeout), run(&engine)).await {
            Ok(outcome) => RunResponse::from(outcome),
            Err(_) => RunResponse {
                success: false,
                error: Some(format!("run timed out after {}s", args.timeout)),
                ..Default::default()
            },
        }
    } else {
        RunResponse::from(run(&engine).await)
    };

    if args.dry_run {
        warn!("Dry run: graph not saved");
    } else {
        store
            .save_json(&args.graph)
            .with_context(|| format!("Failed to save graph to {}", args.graph.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_response(&outcome);
    }

    match outcome.error {
        Some(error) if !outcome.success => Err(anyhow::anyhow!(error)),
        _ => Ok(()),
    }
}

/// Backend for the semantic strategy, if one is configured
fn create_llm_backend(args: &LlmArgs) -> Result<Option<SharedBackend>> {
    if args.no_llm {
        return Ok(None);
    }

    let backend = if args.openrouter {
        let key = args.openrouter_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("OpenRouter API key required. Set OPENROUTER_API_KEY or use --openrouter-key")
        })?;
        create_backend(OpenAIBackendConfig::openrouter(key, &args.model))?
    } else if args.openai {
        let key = args.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("OpenAI API key required. Set OPENAI_API_KEY or use --api-key")
        })?;
        create_backend(OpenAIBackendConfig::openai(key, &args.model))?
    } else {
        // Default: Anthropic, optional
        match args.anthropic_key.as_deref() {
            Some(key) => create_anthropic_backend(AnthropicConfig::new(key, &args.model))?,
            None => {
                warn!("No ANTHROPIC_API_KEY set; semantic strategy disabled (use --no-llm to silence)");
                return Ok(None);
            }
        }
    };

    Ok(Some(backend))
}

fn create_llm_embedder(args: &LlmArgs) -> Result<Option<SharedEmbedder>> {
    if !args.embeddings {
        return Ok(None);
    }

    let (key, base_url) = if args.openrouter {
        (args.openrouter_key.as_deref(), Some("https://openrouter.ai/api/v1"))
    } else {
        (args.api_key.as_deref(), None)
    };
    let key = key.ok_or_else(|| {
        anyhow::anyhow!("Embeddings need an OpenAI-compatible key. Set OPENAI_API_KEY or use --api-key")
    })?;

    Ok(Some(create_embedder(key, base_url, &args.embedding_model)?))
}

fn print_response(response: &RunResponse) {
    let result = &response.result;

    if response.success {
        println!("✅ Run complete in {:.2}s", result.processing_time);
    } else {
        println!(
            "❌ Run failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    println!("\n📊 Results:");
    println!("   Entities analyzed:   {}", result.entities_analyzed);
    println!("   Candidates detected: {}", result.candidates_detected);
    println!("   Below confidence:    {}", result.candidates_filtered);
    println!("   Edges created:       {}", result.edges_created);
    println!("   Edges reinforced:    {}", result.edges_updated);
    println!("   Edges decayed:       {}", result.edges_decayed);
    println!("   Edges pruned:        {}", result.edges_pruned);
    if !result.strategies_run.is_empty() {
        println!("   Strategies:          {}", result.strategies_run.join(", "));
    }
}

fn show_stats(graph: &Path) -> Result<()> {
    let store = InMemoryGraphStore::load_json(graph)
        .with_context(|| format!("Failed to load graph from {}", graph.display()))?;
    let snapshot = store.snapshot();
    let last_nightly = snapshot.last_nightly_run;
    let stats = GraphView::full(snapshot.entities, snapshot.edges).stats();

    println!("📊 Graph: {}", graph.display());
    println!("   Entities:       {}", stats.entity_count);
    println!("   Edges:          {}", stats.edge_count);
    println!("   Average weight: {:.3}", stats.avg_weight);
    match last_nightly {
        Some(at) => println!("   Last nightly:   {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("   Last nightly:   never"),
    }

    Ok(())
}

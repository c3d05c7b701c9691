use anyhow::{Context, Result};
use atlas_community::{
    CommunityDetector, CommunityId, CommunitySnapshot, CommunitySummarizer, LeidenConfig,
};
use atlas_graph::{EntityGraph, GraphBuilder};
use atlas_search::{
    collect_sources as fragment_sources, default_tokenizer, format_context,
    CommunityFirstRetriever, CommunityMatch, Document, MmrSelector, RankedCandidate,
    RetrievalConfig,
};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

mod scan;

#[derive(Parser)]
#[command(name = "atlas")]
#[command(about = "Code knowledge graphs, communities and community-first retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the entity graph of a source tree
    Graph(GraphArgs),

    /// Detect communities in a graph snapshot and attach summaries
    Communities(CommunitiesArgs),

    /// Community-first (optionally hybrid) retrieval over a document corpus
    Search(SearchArgs),
}

#[derive(Args)]
struct GraphArgs {
    /// Repository root to scan
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Write the snapshot here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct CommunitiesArgs {
    /// Graph snapshot produced by `atlas graph`
    #[arg(long)]
    graph: PathBuf,

    /// JSON object mapping community id to summary text
    #[arg(long)]
    summaries: Option<PathBuf>,

    /// Summarize each community by listing its representative entities
    #[arg(long, conflicts_with = "summaries")]
    offline_summaries: bool,

    /// Leiden resolution (higher means smaller communities)
    #[arg(long, default_value_t = 1.0)]
    resolution: f64,

    /// Write the snapshot here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// JSON array of documents (`content` + `metadata.source`)
    #[arg(long)]
    docs: PathBuf,

    /// Community snapshot produced by `atlas communities`
    #[arg(long)]
    communities: PathBuf,

    /// Precomputed dense hits (`[{"document": ..., "score": ...}]`); enables hybrid fusion
    #[arg(long)]
    dense: Option<PathBuf>,

    /// Retrieval config (JSON or TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of results (defaults to the config's total / hybrid top-k)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Diversify the results with MMR
    #[arg(long)]
    mmr: bool,
}

#[derive(Deserialize)]
struct DenseHit {
    document: Document,
    score: f64,
}

#[derive(Serialize)]
struct SearchOutput {
    query: String,
    communities: Vec<CommunityMatch>,
    results: Vec<RankedCandidate>,
    context: String,
    sources: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Graph(args) => run_graph(args),
        Commands::Communities(args) => run_communities(args),
        Commands::Search(args) => run_search(args),
    }
}

fn run_graph(args: GraphArgs) -> Result<()> {
    let root = args
        .root
        .canonicalize()
        .with_context(|| format!("Failed to resolve root {}", args.root.display()))?;
    let files = scan::collect_sources(&root);

    let build = GraphBuilder::new()
        .build(&files)
        .context("Failed to build entity graph")?;
    let report = &build.report;
    eprintln!(
        "Indexed {} files ({} skipped): {} nodes, {} edges",
        report.files_indexed,
        report.files_skipped(),
        build.graph.node_count(),
        build.graph.edge_count()
    );

    let json = build.graph.to_json().context("Failed to serialize graph")?;
    emit(&json, args.out.as_deref())
}

fn run_communities(args: CommunitiesArgs) -> Result<()> {
    let text = fs::read_to_string(&args.graph)
        .with_context(|| format!("Failed to read graph {}", args.graph.display()))?;
    let graph = EntityGraph::from_json(&text)
        .with_context(|| format!("Invalid graph snapshot {}", args.graph.display()))?;
    anyhow::ensure!(
        args.resolution.is_finite() && args.resolution > 0.0,
        "--resolution must be a positive number, got {}",
        args.resolution
    );

    let detector = CommunityDetector::new(LeidenConfig {
        resolution: args.resolution,
        ..LeidenConfig::default()
    });
    let partition = detector.detect(&graph);

    let summaries = if let Some(path) = &args.summaries {
        let mut summaries: BTreeMap<CommunityId, String> = read_json(path)?;
        summaries.retain(|id, _| {
            let known = partition.members(*id).is_some();
            if !known {
                log::warn!("Dropping summary for unknown community {}", id);
            }
            known
        });
        summaries
    } else if args.offline_summaries {
        CommunitySummarizer::new(offline_summary).summarize(&graph, &partition)
    } else {
        BTreeMap::new()
    };

    eprintln!(
        "Detected {} communities over {} nodes ({} summarized)",
        partition.len(),
        partition.node_count(),
        summaries.len()
    );

    let snapshot = CommunitySnapshot::new(partition, summaries);
    let json = snapshot
        .to_json()
        .context("Failed to serialize communities")?;
    emit(&json, args.out.as_deref())
}

/// Deterministic stand-in for an LLM: names the entities listed in the prompt
fn offline_summary(prompt: &str) -> Result<String> {
    let entities: Vec<&str> = prompt
        .lines()
        .filter_map(|line| line.strip_prefix("- "))
        .map(|entry| entry.rsplit_once(" (").map_or(entry, |(id, _)| id))
        .collect();
    if entities.is_empty() {
        anyhow::bail!("prompt lists no entities");
    }
    Ok(format!("Code around {}.", entities.join(", ")))
}

fn run_search(args: SearchArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => RetrievalConfig::from_file(path)?,
        None => RetrievalConfig::default(),
    };
    let documents: Vec<Document> = read_json(&args.docs)?;
    let snapshot: CommunitySnapshot = read_json(&args.communities)?;

    let retriever = CommunityFirstRetriever::with_options(
        &snapshot.communities,
        &snapshot.summaries,
        documents,
        default_tokenizer,
        config.bm25,
    );
    log::info!(
        "Loaded {} documents and {} communities",
        retriever.documents().len(),
        snapshot.communities.len()
    );
    let scope = &config.community;
    let communities = retriever.retrieve_communities(&args.query, scope.top_k_communities);

    let mut results = match &args.dense {
        Some(path) => {
            let hits: Vec<DenseHit> = read_json(path)?;
            let dense: Vec<(Document, f64)> =
                hits.into_iter().map(|hit| (hit.document, hit.score)).collect();
            retriever.hybrid_retrieve(
                &args.query,
                &dense,
                scope.top_k_communities,
                scope.top_k_per_community,
                config.hybrid.alpha,
                args.top_k.unwrap_or(config.hybrid.top_k),
            )
        }
        None => retriever
            .retrieve(
                &args.query,
                scope.top_k_communities,
                scope.top_k_per_community,
                args.top_k.unwrap_or(scope.top_k_total),
            )
            .into_iter()
            .map(|(document, score)| {
                let mut candidate =
                    RankedCandidate::new(document.key(), document.category().to_string(), document);
                candidate.sparse_score = score;
                candidate.final_score = score;
                candidate
            })
            .collect(),
    };

    if args.mmr {
        let selector = MmrSelector::new(config.mmr.lambda);
        results = selector.select(results, &args.query, config.mmr.top_n);
    }
    log::info!("{} results for '{}'", results.len(), args.query);

    let fragments: Vec<Document> = results.iter().map(|r| r.document.clone()).collect();
    let output = SearchOutput {
        query: args.query,
        communities,
        context: format_context(&fragments),
        sources: fragment_sources(&fragments),
        results,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn emit(json: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

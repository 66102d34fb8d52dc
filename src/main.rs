//! CLI entry point for ragdex.
//!
//! Commands map one-to-one onto pipeline stages: `embed` fills the embedding
//! store from chunk files, `build` turns the store into an index pair, and
//! `query` searches it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{
    ArgGroup, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use serde::Serialize;
use tracing::Level;

use ragdex::display::{
    create_embed_summary_table, create_hits_table, create_metadata_table, with_spinner,
};
use ragdex::index::{IndexMetadata, IndexReader, SearchHit};
use ragdex::pipeline::{
    EmbedOptions, build_index, embed_documents, parse_query_vector, query_text,
};
use ragdex::vector::{FastEmbedGenerator, VectorEncoder, model_to_string, parse_embedding_model};
use ragdex::{DirectoryChunkSource, FileBundleStore, PipelineError, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Document embedding and exact nearest-neighbor search
#[derive(Parser)]
#[command(
    name = "ragdex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Embed chunked documents and search them by vector distance",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ ragdex init\n  $ ragdex embed --chunks data/processed/chunks\n  $ ragdex build\n  $ ragdex query --text \"what is retrieval augmented generation\" -k 5"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .ragdex directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Encode chunk files into embedding bundles
    #[command(about = "Generate embeddings for every chunk file")]
    Embed {
        /// Directory of chunk files (overrides paths.chunks_dir)
        #[arg(long)]
        chunks: Option<PathBuf>,

        /// Chunks per embedding call (overrides embedding.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Encode batches in parallel
        #[arg(long)]
        parallel: bool,

        /// Number of threads for parallel batches (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Delete bundles whose chunk file no longer exists
        #[arg(long)]
        prune: bool,
    },

    /// Build the index pair from the embedding store
    #[command(about = "Build the nearest-neighbor index from stored embeddings")]
    Build,

    /// Search the index
    #[command(
        about = "Find the chunks nearest to a query",
        group(ArgGroup::new("input").required(true).args(["text", "vector"]))
    )]
    Query {
        /// Query text, embedded with the configured model
        #[arg(long)]
        text: Option<String>,

        /// Raw query vector, comma separated (e.g. 1,0,0.5)
        #[arg(long, allow_hyphen_values = true)]
        vector: Option<String>,

        /// Number of results (overrides search.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index information
    #[command(about = "Display metadata of the current index")]
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct QueryOutput<'a> {
    k: usize,
    hits: &'a [SearchHit],
}

#[derive(Debug, Serialize)]
struct InfoOutput<'a> {
    #[serde(flatten)]
    metadata: &'a IndexMetadata,
    pair_valid: bool,
    created: String,
}

fn main() {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Init { .. }) && cli.config.is_none() {
        if let Err(warning) = Settings::check_init() {
            eprintln!("Warning: {warning}");
            eprintln!("Using default configuration for now.");
        }
    }

    let mut settings = if let Some(config_path) = &cli.config {
        Settings::load_from(config_path).unwrap_or_else(|e| {
            let err = PipelineError::config(format!("{}: {e}", config_path.display()));
            report_error(&err.into());
            std::process::exit(1);
        })
    } else {
        Settings::load().unwrap_or_else(|e| {
            eprintln!("Warning: {}", PipelineError::config(e));
            eprintln!("Using default configuration for now.");
            Settings::default()
        })
    };
    if cli.debug {
        settings.debug = true;
    }

    init_logging(settings.debug);

    if let Err(err) = run(cli.command, settings) {
        report_error(&err);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_error(err: &anyhow::Error) {
    eprintln!("Error: {err:#}");
    if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
        eprintln!("Status: {}", pipeline_err.status_code());
        let suggestions = pipeline_err.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("\nSuggestions:");
            for suggestion in suggestions {
                eprintln!("  - {suggestion}");
            }
        }
    }
}

fn run(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force).map_err(PipelineError::config)?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            Ok(())
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }

        Commands::Embed {
            chunks,
            batch_size,
            parallel,
            threads,
            prune,
        } => run_embed(&settings, chunks, batch_size, parallel, threads, prune),

        Commands::Build => run_build(&settings),

        Commands::Query {
            text,
            vector,
            k,
            json,
        } => run_query(&settings, text, vector, k, json),

        Commands::Info { json } => run_info(&settings, json),
    }
}

fn load_encoder(settings: &Settings, batch_size: usize, threads: usize) -> Result<VectorEncoder> {
    let model = parse_embedding_model(&settings.embedding.model).map_err(PipelineError::from)?;
    let cache_dir = settings.resolve(&settings.embedding.cache_dir);
    let show_progress = settings.embedding.show_progress;

    let generator = with_spinner("Loading embedding model", || {
        FastEmbedGenerator::with_model(model, &cache_dir, show_progress)
    })
    .map_err(PipelineError::from)?;

    let encoder = VectorEncoder::new(Arc::new(generator), batch_size)
        .and_then(|e| e.with_parallelism(threads))
        .map_err(PipelineError::from)?
        .with_progress(show_progress);
    Ok(encoder)
}

fn run_embed(
    settings: &Settings,
    chunks: Option<PathBuf>,
    batch_size: Option<usize>,
    parallel: bool,
    threads: Option<usize>,
    prune: bool,
) -> Result<()> {
    let chunks_dir = settings.resolve(&chunks.unwrap_or_else(|| settings.paths.chunks_dir.clone()));
    let embeddings_dir = settings.resolve(&settings.paths.embeddings_dir);
    let batch_size = batch_size.unwrap_or(settings.embedding.batch_size);
    let threads = if parallel || settings.embedding.parallel_batches {
        threads.unwrap_or(settings.embedding.threads)
    } else {
        1
    };

    let encoder = load_encoder(settings, batch_size, threads)?;
    let source = DirectoryChunkSource::new(&chunks_dir);
    let store = FileBundleStore::new(&embeddings_dir);

    tracing::info!(
        chunks_dir = %chunks_dir.display(),
        embeddings_dir = %embeddings_dir.display(),
        batch_size,
        threads,
        "Starting embed"
    );

    let start = Instant::now();
    let report = embed_documents(&source, &encoder, &store, EmbedOptions { prune })?;

    println!("{}", create_embed_summary_table(&report));
    println!(
        "Embedded {} vectors from {} files in {:.2}s",
        report.vector_count(),
        report.embedded_files(),
        start.elapsed().as_secs_f64()
    );
    if report.failed_files() > 0 {
        eprintln!(
            "Warning: {} files failed; see the log above for details",
            report.failed_files()
        );
    }
    Ok(())
}

fn run_build(settings: &Settings) -> Result<()> {
    let embeddings_dir = settings.resolve(&settings.paths.embeddings_dir);
    let index_dir = settings.resolve(&settings.paths.index_dir);
    let store = FileBundleStore::new(&embeddings_dir);

    let model_name = parse_embedding_model(&settings.embedding.model)
        .map(|m| model_to_string(&m))
        .unwrap_or_else(|_| settings.embedding.model.clone());

    let start = Instant::now();
    let report = build_index(&store, &index_dir, &model_name)?;

    println!("{}", create_metadata_table(&report.metadata));
    println!(
        "Index written to {} in {:.2}s",
        index_dir.display(),
        start.elapsed().as_secs_f64()
    );
    for skipped in &report.skipped {
        eprintln!("Warning: skipped bundle '{}': {}", skipped.key, skipped.error);
    }
    Ok(())
}

fn run_query(
    settings: &Settings,
    text: Option<String>,
    vector: Option<String>,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let index_dir = settings.resolve(&settings.paths.index_dir);
    let k = k.unwrap_or(settings.search.default_k);
    let reader = IndexReader::open(&index_dir).map_err(PipelineError::from)?;

    let hits = match (text, vector) {
        (_, Some(vector)) => {
            let vector = parse_query_vector(&vector)?;
            reader.query(&vector, k).map_err(PipelineError::from)?
        }
        (Some(text), None) => {
            let encoder = load_encoder(settings, settings.embedding.batch_size, 1)?;
            query_text(&reader, &encoder, &text, k)?
        }
        (None, None) => bail!("Provide either --text or --vector"),
    };

    if json {
        let output = QueryOutput { k, hits: &hits };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize results")?
        );
    } else if hits.is_empty() {
        println!("No results.");
    } else {
        println!("{}", create_hits_table(&hits));
    }
    Ok(())
}

fn run_info(settings: &Settings, json: bool) -> Result<()> {
    let index_dir = settings.resolve(&settings.paths.index_dir);
    let metadata = IndexMetadata::load(&index_dir).map_err(PipelineError::from)?;
    let pair = IndexReader::open(&index_dir);

    if json {
        let output = InfoOutput {
            metadata: &metadata,
            pair_valid: pair.is_ok(),
            created: metadata.created_at_display(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", create_metadata_table(&metadata));
        println!("Index directory: {}", index_dir.display());
    }

    if let Err(err) = pair {
        return Err(PipelineError::from(err).into());
    }
    Ok(())
}

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use docsim_core::persist::{load_index, save_index, IndexPaths};
use docsim_core::{load_documents, DocumentIndex, IndexConfig, IndexError, DEFAULT_TOP_K};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "docsim-indexer")]
#[command(about = "Fit a TF-IDF document index and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the index over a JSON/JSONL document file and write the vector cache
    Build {
        /// Input document file (.json array or .jsonl)
        #[arg(long)]
        input: String,
        /// Output cache directory
        #[arg(long)]
        output: String,
        #[command(flatten)]
        vectorizer: VectorizerArgs,
    },
    /// Rank documents against a query and print the hits as JSON
    Query {
        /// Input document file (.json array or .jsonl)
        #[arg(long)]
        input: String,
        /// Reuse a vector cache written by `build` instead of refitting
        #[arg(long)]
        index: Option<String>,
        /// Number of hits to return
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        k: usize,
        #[command(flatten)]
        vectorizer: VectorizerArgs,
        /// Query text
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[derive(Args)]
struct VectorizerArgs {
    /// TOML file with vectorizer settings; flags below override it
    #[arg(long)]
    config: Option<String>,
    /// Minimum number of documents a term must appear in
    #[arg(long)]
    min_df: Option<usize>,
    /// Maximum fraction of documents a term may appear in
    #[arg(long)]
    max_df: Option<f32>,
    /// Use IDF = ln(N/df) instead of the smoothed ln(1 + N/df)
    #[arg(long, default_value_t = false)]
    plain_idf: bool,
    /// Disable stemming
    #[arg(long, default_value_t = false)]
    no_stem: bool,
    /// Use 1 + ln(tf) instead of the raw term count
    #[arg(long, default_value_t = false)]
    sublinear_tf: bool,
}

impl VectorizerArgs {
    fn resolve(&self) -> Result<IndexConfig> {
        let mut cfg = match &self.config {
            Some(path) => IndexConfig::from_toml_file(path)?,
            None => IndexConfig::default(),
        };
        if let Some(min_df) = self.min_df { cfg.min_doc_freq = min_df; }
        if let Some(max_df) = self.max_df { cfg.max_doc_freq = max_df; }
        if self.plain_idf { cfg.smoothed_idf = false; }
        if self.no_stem { cfg.stem = false; }
        if self.sublinear_tf { cfg.sublinear_tf = true; }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Serialize)]
struct QueryHit<'a> {
    name: &'a str,
    score: f32,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, vectorizer } => {
            build_cache(&input, &output, &vectorizer.resolve()?)
        }
        Commands::Query { input, index, k, vectorizer, text } => {
            run_query(&input, index.as_deref(), k, &vectorizer.resolve()?, &text.join(" "))
        }
    }
}

fn build_cache(input: &str, output: &str, config: &IndexConfig) -> Result<()> {
    let index = DocumentIndex::try_build(load_documents(input)?, config)?;
    tracing::info!(num_docs = index.len(), num_terms = index.vocabulary_len(), "ingested documents");
    save_index(&IndexPaths::new(output), &index)?;
    tracing::info!(output, "index build complete");
    Ok(())
}

fn run_query(input: &str, cache: Option<&str>, k: usize, config: &IndexConfig, text: &str) -> Result<()> {
    let documents = load_documents(input)?;
    let index = match cache {
        Some(dir) => match load_index(&IndexPaths::new(dir), documents.clone(), config) {
            Ok(index) => index,
            Err(e @ (IndexError::VectorizerMismatch(_) | IndexError::DataLoad { .. })) => {
                tracing::warn!(cache = dir, error = %e, "vector cache unusable, refitting");
                DocumentIndex::build(documents, config)
            }
            Err(e) => return Err(e.into()),
        },
        None => DocumentIndex::build(documents, config),
    };

    let hits = index.query(text, k);
    let out: Vec<QueryHit> = hits.iter().map(|h| QueryHit { name: &h.document.name, score: h.score }).collect();
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

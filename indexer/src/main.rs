use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quarry_core::config::default_workers;
use quarry_core::tokenizer::tokenize;
use quarry_core::{ContentRegistry, Corpus, IdfWeighting, IndexBuilder, IndexStore, QueryEngine, Snapshot, StopwordSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "quarry-indexer")]
#[command(about = "Build and inspect a TF-IDF index of a directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a directory and build a fresh index
    Build {
        /// Directory to index
        #[arg(long)]
        root: PathBuf,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Worker threads for the TF-IDF pass
        #[arg(long, default_value_t = default_workers())]
        workers: usize,
        /// Stopword file, one word per line; built-in English list if omitted
        #[arg(long)]
        stopwords: Option<PathBuf>,
        /// Use smoothed IDF = log10(1 + N/df) instead of log10(N/df). Without it a
        /// term found in every document scores 0 and never matches a query.
        #[arg(long, default_value_t = false)]
        smoothed_idf: bool,
    },
    /// Rank documents of a persisted index against some terms
    Query {
        #[arg(long)]
        root: PathBuf,
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Print what a persisted index holds
    Stats {
        #[arg(long)]
        root: PathBuf,
        #[arg(long, default_value = "./index")]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { root, index, workers, stopwords, smoothed_idf } => {
            let weighting = if smoothed_idf { IdfWeighting::Smoothed } else { IdfWeighting::Plain };
            build_index(&root, &index, workers, stopwords.as_deref(), weighting)
        }
        Commands::Query { root, index, terms } => query_index(&root, &index, &terms),
        Commands::Stats { root, index } => print_stats(&root, &index),
    }
}

fn build_index(root: &Path, index: &Path, workers: usize, stopwords: Option<&Path>, weighting: IdfWeighting) -> Result<()> {
    let start = Instant::now();
    let stopwords = Arc::new(stopwords.map(StopwordSet::load).unwrap_or_else(StopwordSet::english));
    let builder = IndexBuilder::new(workers, weighting)?;

    let mut corpus = Corpus::build(root, ContentRegistry::default(), stopwords)
        .with_context(|| format!("walking {}", root.display()))?;
    tracing::info!(num_docs = corpus.len(), elapsed_ms = start.elapsed().as_millis() as u64, "ingested documents");

    let snapshot = builder.build(&mut corpus)?;
    std::fs::create_dir_all(index).with_context(|| format!("creating {}", index.display()))?;
    IndexStore::new(index).save(&corpus)?;

    tracing::info!(
        output = %index.display(),
        num_docs = snapshot.len(),
        num_terms = snapshot.term_count(),
        elapsed_s = start.elapsed().as_secs_f64(),
        "index build complete"
    );
    Ok(())
}

fn load(root: &Path, index: &Path) -> Result<Snapshot> {
    let corpus = IndexStore::new(index)
        .load(root, ContentRegistry::default(), Arc::new(StopwordSet::empty()))
        .with_context(|| format!("loading index from {}", index.display()))?;
    Ok(Snapshot::capture(corpus.documents()))
}

fn query_index(root: &Path, index: &Path, terms: &[String]) -> Result<()> {
    let snapshot = load(root, index)?;
    let terms = tokenize(&terms.join(" "));
    for hit in QueryEngine::default().rank(&snapshot, &terms) {
        println!("{}\t{:.6}", hit.path, hit.score);
    }
    Ok(())
}

fn print_stats(root: &Path, index: &Path) -> Result<()> {
    let meta = IndexStore::new(index).load_meta()?;
    let snapshot = load(root, index)?;
    println!("root:       {}", meta.root);
    println!("documents:  {}", snapshot.len());
    println!("terms:      {}", snapshot.term_count());
    println!("version:    {}", meta.version);
    match OffsetDateTime::parse(&meta.created_at, &Rfc3339) {
        Ok(created) => {
            let age = OffsetDateTime::now_utc() - created;
            println!("created_at: {} ({}s ago)", meta.created_at, age.whole_seconds());
        }
        Err(_) => println!("created_at: {}", meta.created_at),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn smoothed_idf_help_explains_the_plain_default() {
        let mut cli = Cli::command();
        let build = cli.find_subcommand_mut("build").unwrap();
        let arg = build.get_arguments().find(|a| a.get_id() == "smoothed_idf").unwrap();
        assert!(arg.get_help().unwrap().to_string().contains("never matches"));
    }

    #[test]
    fn build_defaults_to_plain_idf() {
        let cli = Cli::try_parse_from(["quarry-indexer", "build", "--root", "docs"]).unwrap();
        assert!(matches!(cli.command, Commands::Build { smoothed_idf: false, .. }));
    }
}

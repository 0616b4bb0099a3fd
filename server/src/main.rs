use anyhow::Result;
use clap::Parser;
use quarry_core::config::default_workers;
use quarry_core::{IdfWeighting, IndexConfig, SearchIndex};
use quarry_server::{build_app, log_outcome, spawn_reindex_timer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Directory to index
    #[arg(long)]
    root: PathBuf,
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Worker threads for TF-IDF builds
    #[arg(long, default_value_t = default_workers())]
    workers: usize,
    /// Seconds between reindex ticks
    #[arg(long, default_value_t = 60)]
    interval: u64,
    /// Stopword file, one word per line
    #[arg(long)]
    stopwords: Option<PathBuf>,
    /// Use smoothed IDF = log10(1 + N/df) instead of log10(N/df). Without it a
    /// term found in every document scores 0 and never matches a query.
    #[arg(long, default_value_t = false)]
    smoothed_idf: bool,
    /// Results must score above this
    #[arg(long, default_value_t = 0.0)]
    min_score: f64,
}

impl Args {
    fn config(&self) -> IndexConfig {
        let mut config = IndexConfig::new(&self.root, &self.index);
        config.workers = self.workers;
        config.reindex_interval = Duration::from_secs(self.interval);
        config.stopwords = self.stopwords.clone();
        config.weighting = if self.smoothed_idf { IdfWeighting::Smoothed } else { IdfWeighting::Plain };
        config.min_score = self.min_score;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = args.config();

    let index = {
        let config = config.clone();
        Arc::new(tokio::task::spawn_blocking(move || SearchIndex::open(&config)).await??)
    };
    // Catch files changed while the server was down.
    let startup = Arc::clone(&index);
    log_outcome(&tokio::task::spawn_blocking(move || startup.tick()).await?);

    let timer = spawn_reindex_timer(Arc::clone(&index), config.reindex_interval);
    let app = build_app(index);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    timer.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

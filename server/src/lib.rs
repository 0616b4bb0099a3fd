use axum::{extract::{Query, State}, http::StatusCode, routing::{get, post}, Form, Json, Router};
use quarry_core::{IndexStats, RankedDocument, SearchIndex, TickOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

/// Body of the HTML search form.
#[derive(Deserialize)]
pub struct SearchForm {
    #[serde(rename = "input-text")]
    pub input_text: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<RankedDocument>,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SearchIndex>,
}

pub fn build_app(index: Arc<SearchIndex>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler).post(search_form_handler))
        .route("/stats", get(stats_handler))
        .route("/index/reindex", post(reindex_handler))
        .with_state(AppState { index })
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

// CORS_ALLOW_ORIGIN is a comma-separated origin list; anything else allows all.
fn cors_layer() -> CorsLayer {
    let any = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                any
            } else {
                any.allow_origin(AllowOrigin::list(origins))
            }
        }
        Err(_) => any,
    }
}

fn run_search(index: &SearchIndex, query: String, k: usize) -> SearchResponse {
    let start = Instant::now();
    let mut results = index.search(&query);
    let total_hits = results.len();
    results.truncate(k.clamp(1, MAX_K));
    let elapsed = start.elapsed();
    tracing::debug!(query = %query, total_hits, "search");
    SearchResponse { query, took_ms: elapsed.as_millis(), took_s: elapsed.as_secs_f64(), total_hits, results }
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    Json(run_search(&state.index, params.q, params.k))
}

pub async fn search_form_handler(State(state): State<AppState>, Form(form): Form<SearchForm>) -> Json<SearchResponse> {
    Json(run_search(&state.index, form.input_text, form.k))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.index.stats())
}

/// Run one reindex tick now. Overlapping with the timer yields `skipped`.
pub async fn reindex_handler(State(state): State<AppState>) -> Result<Json<TickOutcome>, (StatusCode, String)> {
    let index = Arc::clone(&state.index);
    let outcome = tokio::task::spawn_blocking(move || index.tick())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("reindex task failed: {e}")))?;
    log_outcome(&outcome);
    Ok(Json(outcome))
}

/// Tick `index` every `every`, first after one full period. Each tick runs on
/// the blocking pool and is awaited before the next, so ticks never overlap.
pub fn spawn_reindex_timer(index: Arc<SearchIndex>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let index = Arc::clone(&index);
            match tokio::task::spawn_blocking(move || index.tick()).await {
                Ok(outcome) => log_outcome(&outcome),
                Err(e) => tracing::error!(error = %e, "reindex task panicked"),
            }
        }
    })
}

pub fn log_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Skipped => tracing::debug!("reindex skipped, previous tick still running"),
        TickOutcome::Unchanged => tracing::debug!("reindex found no changes"),
        TickOutcome::Rebuilt { reindexed, added, removed, generation } => {
            tracing::info!(reindexed, added, removed, generation, "index rebuilt")
        }
        TickOutcome::Failed { reason } => tracing::warn!(%reason, "reindex failed"),
    }
}

pub mod config;
pub mod fetcher;
pub mod github;
pub mod metrics;
pub mod querier;
pub mod repo_url;
pub mod types;
pub mod window;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use config::AppConfig;
use fetcher::DoraReport;
use github::{ActivitySource, GitHubClient};
use querier::DoraQuerier;
use repo_url::RepositoryRef;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
pub struct DoraQuery {
    url: String,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service for querying DORA reports.
    pub querier: DoraQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state backed by the GitHub API.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = GitHubClient::new(&config)?;
        Ok(Self::with_source(config, Arc::new(client)))
    }

    /// Initializes the application state with an arbitrary activity source.
    pub fn with_source(config: AppConfig, source: Arc<dyn ActivitySource>) -> Self {
        let querier = DoraQuerier::new(&config, source);
        Self { querier, config }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/repos/popular", get(get_popular_repos))
        .route("/api/repos/{owner}/{repo}/dora", get(get_repo_dora))
        .route("/api/dora", get(get_dora_by_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "doraflow-backend",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_popular_repos(State(state): State<Arc<AppState>>) -> Json<Vec<RepositoryRef>> {
    Json(state.config.popular_repos.clone())
}

pub async fn get_repo_dora(
    Path(repo): Path<RepositoryRef>,
    State(state): State<Arc<AppState>>,
) -> Json<DoraReport> {
    let report = state.querier.get(repo.clone()).await;
    tracing::debug!(repo = %repo, complete = report.has_data(), "Returning DORA report");
    Json(report)
}

pub async fn get_dora_by_url(
    Query(query): Query<DoraQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DoraReport>, (StatusCode, String)> {
    match state.querier.get_by_url(&query.url).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            tracing::info!(url = %query.url, "Rejected repository URL: {}", e);
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

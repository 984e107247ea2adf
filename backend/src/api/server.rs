//! HTTP Server for the stock report API.
//!
//! Every request is one explicit pipeline run with the caller's current
//! selections. Prepared rows are cached per list of sources, so changing a
//! filter only reruns the filter, aggregate and rank stages.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                        |
//! |--------|-----------------------|------------------------------------|
//! | GET    | `/health`             | Health check                       |
//! | GET    | `/api/profiles`       | List report profiles               |
//! | GET    | `/api/profiles/{id}`  | Full profile definition            |
//! | POST   | `/api/report`         | Run a report, JSON result          |
//! | POST   | `/api/export`         | Run a report, CSV of the details   |
//! | GET    | `/api/logs`           | SSE stream for real-time logs      |

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, ProfileSummary, ReportRequest};
use crate::cache::RowSetCache;
use crate::config::AppConfig;
use crate::error::{ReportError, ServerError, ServerResult};
use crate::profiles::{builtin_profiles, ProfileRegistry, ReportProfile, DEFAULT_PROFILE};
use crate::report::ReportResult;
use crate::transform::pipeline::run_prepared;

type ApiError = (StatusCode, Json<Value>);

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<Mutex<RowSetCache>>,
    pub registry: Arc<Mutex<ProfileRegistry>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let registry = ProfileRegistry::with_dir(&config.profile_dir);
        let cache = RowSetCache::with_capacity(config.cache_capacity);
        Self {
            config: Arc::new(config),
            cache: Arc::new(Mutex::new(cache)),
            registry: Arc::new(Mutex::new(registry)),
        }
    }
}

/// Build the router with CORS and shared state
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/profiles", get(list_profiles))
        .route("/api/profiles/{id}", get(get_profile))
        .route("/api/report", post(create_report))
        .route("/api/export", post(export_report))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let app = router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Stock report server running on http://localhost:{}", port);
    println!("   GET  /api/profiles - Report profiles");
    println!("   POST /api/report   - Run a report");
    println!("   POST /api/export   - Download detail CSV");
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "stockreport",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "profiles": "GET /api/profiles",
            "report": "POST /api/report",
            "export": "POST /api/export",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<ProfileSummary>>, ApiError> {
    let registry = state
        .registry
        .lock()
        .map_err(|_| api_error(ServerError::Internal("profile registry lock poisoned".into())))?;

    let builtin_count = builtin_profiles().len();
    let summaries = registry
        .list()
        .iter()
        .enumerate()
        .map(|(i, p)| ProfileSummary::new(p, i < builtin_count))
        .collect();
    Ok(Json(summaries))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportProfile>, ApiError> {
    let registry = state
        .registry
        .lock()
        .map_err(|_| api_error(ServerError::Internal("profile registry lock poisoned".into())))?;
    registry
        .resolve(&id)
        .map(Json)
        .map_err(|e| api_error(e.into()))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn create_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ReportResult>, ApiError> {
    run_request(state, request).await.map(Json).map_err(api_error)
}

async fn export_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = run_request(state, request).await.map_err(api_error)?;
    let body = report
        .export_csv()
        .map_err(|e| api_error(ServerError::Report(e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.export_file_name),
            ),
        ],
        body,
    ))
}

/// Run the pipeline off the async runtime
async fn run_request(state: AppState, request: ReportRequest) -> ServerResult<ReportResult> {
    tokio::task::spawn_blocking(move || run_blocking(&state, &request))
        .await
        .map_err(|e| ServerError::Internal(format!("report task failed: {}", e)))?
}

fn run_blocking(state: &AppState, request: &ReportRequest) -> ServerResult<ReportResult> {
    let sources = state.config.request_sources(request.source_specs())?;
    if sources.is_empty() {
        return Err(ServerError::BadRequest(
            "no sources given and STOCKREPORT_SOURCES is not set".into(),
        ));
    }

    let profile = match &request.profile_definition {
        Some(profile) => profile.clone(),
        None => {
            let id = request.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
            let registry = state
                .registry
                .lock()
                .map_err(|_| ServerError::Internal("profile registry lock poisoned".into()))?;
            registry.resolve(id)?
        }
    };

    let prepared = {
        let mut cache = state
            .cache
            .lock()
            .map_err(|_| ServerError::Internal("row set cache lock poisoned".into()))?;
        cache.get_or_prepare(&sources)?
    };

    let report = run_prepared(&prepared, &profile, &request.selections)?;

    if let Ok(mut registry) = state.registry.lock() {
        registry.record_use(&profile.id);
    }
    Ok(report)
}

fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::Report(report) => match report {
            ReportError::UnknownProfile(_) => StatusCode::NOT_FOUND,
            ReportError::SourceUnavailable { .. }
            | ReportError::MissingColumn(_)
            | ReportError::NoSources
            | ReportError::InvalidLimit(_)
            | ReportError::Predicate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReportError::Registry(_) | ReportError::Export(_) | ReportError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

fn api_error(err: ServerError) -> ApiError {
    let status = status_for(&err);
    log_error(err.to_string());
    (status, Json(error_response(&err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ServerError::BadRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ReportError::UnknownProfile("x".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ReportError::source_unavailable("a.csv", SourceError::Empty).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_run_without_sources_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(AppConfig {
            profile_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        });
        let err = run_blocking(&state, &ReportRequest::default()).unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn test_run_blocking_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("stock.csv");
        std::fs::write(
            &csv,
            "Item Name,Category,LP Supplier,Cost,Stock,Total Sales\nX,Oud,S1,10,5,0\nY,Oud,S2,4,0,2\n",
        )
        .unwrap();
        let state = AppState::new(AppConfig {
            profile_dir: dir.path().join("profiles"),
            data_dir: Some(dir.path().to_path_buf()),
            ..AppConfig::default()
        });
        let request = ReportRequest {
            sources: vec!["stock.csv".to_string()],
            ..ReportRequest::default()
        };

        let first = run_blocking(&state, &request).unwrap();
        let second = run_blocking(&state, &request).unwrap();

        assert_eq!(first.metrics.item_count, 1);
        assert_eq!(second.metrics.total_stock_value, 50.0);
        assert_eq!(state.cache.lock().unwrap().hits(), 1);
    }

    #[test]
    fn test_unlisted_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("stock.csv");
        std::fs::write(&csv, "Item Name,Cost,Stock,Total Sales\nX,10,5,0\n").unwrap();
        let state = AppState::new(AppConfig {
            profile_dir: dir.path().join("profiles"),
            ..AppConfig::default()
        });
        let request = ReportRequest {
            sources: vec![csv.display().to_string()],
            ..ReportRequest::default()
        };

        let err = run_blocking(&state, &request).unwrap_err();
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
        assert!(state.cache.lock().unwrap().is_empty());
    }
}
